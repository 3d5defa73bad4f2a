//! Content-based router: payload-predicate routing on a numeric `amount` field (C7, §4.7).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{Fields, ScriptLibrary};

use super::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    pub payment_id: Option<String>,
    pub amount: f64,
    pub country: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub destination: String,
    pub id: String,
}

pub struct ContentRouterEngine {
    store: Arc<dyn ScriptLibrary>,
    prefix: String,
}

impl ContentRouterEngine {
    pub fn new(store: Arc<dyn ScriptLibrary>, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into() }
    }

    /// §4.7's table, ranges half-open so every amount lands in exactly one bucket.
    fn destination_for(&self, amount: f64) -> &'static str {
        if amount < 0.0 {
            "dlq"
        } else if amount < 100.0 {
            "standard"
        } else if amount < 10_000.0 {
            "highRisk"
        } else {
            "manualReview"
        }
    }

    pub async fn submit(&self, submission: PaymentSubmission) -> Result<RoutingDecision, EngineError> {
        let bucket = self.destination_for(submission.amount);
        let destination = if bucket == "dlq" {
            format!("{}:dlq", self.prefix)
        } else {
            format!("{}.{bucket}", self.prefix)
        };

        let mut fields = Fields::new();
        if let Some(payment_id) = &submission.payment_id {
            fields.insert("paymentId".to_string(), payment_id.clone());
        }
        fields.insert("amount".to_string(), submission.amount.to_string());
        fields.insert("country".to_string(), submission.country.clone());
        fields.insert("method".to_string(), submission.method.clone());

        let id = self.store.append(&destination, fields).await?;
        Ok(RoutingDecision { destination, id })
    }

    pub fn rules(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("< 0", "dlq"),
            ("[0, 100)", "standard"),
            ("[100, 10000)", "highRisk"),
            (">= 10000", "manualReview"),
        ]
    }

    pub async fn clear(&self) -> Result<(), EngineError> {
        for suffix in ["dlq", "standard", "highRisk", "manualReview"] {
            let log = if suffix == "dlq" {
                format!("{}:dlq", self.prefix)
            } else {
                format!("{}.{suffix}", self.prefix)
            };
            self.store.delete(&log).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn submission(amount: f64) -> PaymentSubmission {
        PaymentSubmission {
            payment_id: None,
            amount,
            country: "DE".to_string(),
            method: "card".to_string(),
        }
    }

    #[tokio::test]
    async fn every_amount_bucket_is_covered() {
        let engine = ContentRouterEngine::new(Arc::new(MemoryStore::new()), "content-routing");

        assert_eq!(engine.submit(submission(-15.0)).await.unwrap().destination, "content-routing:dlq");
        assert_eq!(engine.submit(submission(50.0)).await.unwrap().destination, "content-routing.standard");
        assert_eq!(engine.submit(submission(500.0)).await.unwrap().destination, "content-routing.highRisk");
        assert_eq!(engine.submit(submission(150_000.0)).await.unwrap().destination, "content-routing.manualReview");
    }

    #[tokio::test]
    async fn boundaries_are_unambiguous() {
        let engine = ContentRouterEngine::new(Arc::new(MemoryStore::new()), "content-routing");
        assert_eq!(engine.submit(submission(0.0)).await.unwrap().destination, "content-routing.standard");
        assert_eq!(engine.submit(submission(100.0)).await.unwrap().destination, "content-routing.highRisk");
        assert_eq!(engine.submit(submission(10_000.0)).await.unwrap().destination, "content-routing.manualReview");
    }
}
