//! Topic-routing exchange: dynamic, priority-ordered rules (C6, §4.6).

use std::sync::Arc;

use chrono::Utc;

use crate::store::{Fields, RouteResult, RoutingMetadata, RoutingRule, ScriptLibrary};

use super::error::EngineError;

fn rules_key(exchange: &str) -> String {
    format!("routing:rules:{exchange}")
}

fn meta_key(exchange: &str) -> String {
    format!("routing:meta:{exchange}")
}

pub struct TopicRoutingEngine {
    store: Arc<dyn ScriptLibrary>,
}

impl TopicRoutingEngine {
    pub fn new(store: Arc<dyn ScriptLibrary>) -> Self {
        Self { store }
    }

    fn validate(rule: &RoutingRule, max_rules: u32, existing: usize, is_new: bool) -> Result<(), EngineError> {
        if rule.id.trim().is_empty() {
            return Err(EngineError::Validation("rule id must not be empty".into()));
        }
        if rule.pattern.trim().is_empty() {
            return Err(EngineError::Validation("rule pattern must not be empty".into()));
        }
        if rule.destination.trim().is_empty() {
            return Err(EngineError::Validation("rule destination must not be empty".into()));
        }
        if !(1..=999).contains(&rule.priority) {
            return Err(EngineError::Validation("priority must be in [1, 999]".into()));
        }
        if regex::Regex::new(&rule.pattern).is_err() {
            return Err(EngineError::Validation(format!("invalid pattern: {}", rule.pattern)));
        }
        if is_new && existing >= max_rules as usize {
            return Err(EngineError::Validation(format!("exchange already has the maximum of {max_rules} rules")));
        }
        Ok(())
    }

    pub async fn metadata(&self, exchange: &str) -> Result<RoutingMetadata, EngineError> {
        let raw = self.store.hgetall(&meta_key(exchange)).await?;
        if raw.is_empty() {
            return Ok(RoutingMetadata::default());
        }
        Ok(RoutingMetadata {
            max_rules: raw.get("maxRules").and_then(|s| s.parse().ok()).unwrap_or(100),
            version: raw.get("version").and_then(|s| s.parse().ok()).unwrap_or(1),
            updated_at: raw
                .get("updatedAt")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(Utc::now),
            description: raw.get("description").cloned().unwrap_or_default(),
        })
    }

    pub async fn set_metadata(&self, exchange: &str, metadata: &RoutingMetadata) -> Result<(), EngineError> {
        self.store.hset(&meta_key(exchange), "maxRules", &metadata.max_rules.to_string()).await?;
        self.store.hset(&meta_key(exchange), "version", &metadata.version.to_string()).await?;
        self.store.hset(&meta_key(exchange), "updatedAt", &metadata.updated_at.to_rfc3339()).await?;
        self.store.hset(&meta_key(exchange), "description", &metadata.description).await?;
        Ok(())
    }

    pub async fn list_rules(&self, exchange: &str) -> Result<Vec<RoutingRule>, EngineError> {
        let raw = self.store.hgetall(&rules_key(exchange)).await?;
        let mut rules: Vec<RoutingRule> = raw
            .values()
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    pub async fn get_rule(&self, exchange: &str, id: &str) -> Result<RoutingRule, EngineError> {
        let raw = self.store.hgetall(&rules_key(exchange)).await?;
        raw.get(id)
            .and_then(|json| serde_json::from_str(json).ok())
            .ok_or_else(|| EngineError::NotFound(format!("rule '{id}' on exchange '{exchange}'")))
    }

    pub async fn save_rule(&self, exchange: &str, rule: RoutingRule) -> Result<RoutingRule, EngineError> {
        let metadata = self.metadata(exchange).await?;
        let existing = self.list_rules(exchange).await?;
        let is_new = !existing.iter().any(|r| r.id == rule.id);
        Self::validate(&rule, metadata.max_rules, existing.len(), is_new)?;

        let json = serde_json::to_string(&rule)
            .map_err(|e| EngineError::Validation(format!("could not encode rule: {e}")))?;
        self.store.hset(&rules_key(exchange), &rule.id, &json).await?;
        Ok(rule)
    }

    pub async fn delete_rule(&self, exchange: &str, id: &str) -> Result<(), EngineError> {
        self.store.hdel(&rules_key(exchange), id).await?;
        Ok(())
    }

    pub async fn reset(&self, exchange: &str) -> Result<(), EngineError> {
        self.store.hdel_all(&rules_key(exchange)).await?;
        self.store.hdel_all(&meta_key(exchange)).await?;
        Ok(())
    }

    pub async fn route(&self, exchange: &str, routing_key: &str, payload: Fields) -> Result<RouteResult, EngineError> {
        Ok(self.store.route_message(exchange, routing_key, payload).await?)
    }

    pub async fn routing_keys(&self, exchange: &str) -> Result<Vec<String>, EngineError> {
        Ok(self
            .list_rules(exchange)
            .await?
            .into_iter()
            .map(|r| r.pattern)
            .collect())
    }

    pub async fn clear(&self, exchange: &str) -> Result<(), EngineError> {
        self.store.delete(exchange).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn rule(id: &str, pattern: &str, destination: &str, priority: i32, stop_on_match: bool) -> RoutingRule {
        RoutingRule {
            id: id.to_string(),
            pattern: pattern.to_string(),
            destination: destination.to_string(),
            description: String::new(),
            priority,
            enabled: true,
            stop_on_match,
        }
    }

    #[tokio::test]
    async fn rejects_priority_out_of_range() {
        let engine = TopicRoutingEngine::new(Arc::new(MemoryStore::new()));
        let result = engine.save_rule("ex", rule("R1", "^a", "dest", 0, false)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stop_on_match_halts_lower_priority_rules() {
        let engine = TopicRoutingEngine::new(Arc::new(MemoryStore::new()));
        let exchange = "events.topic.v1";
        engine.save_rule(exchange, rule("R10", r"^order\.", "events.order.v1", 100, false)).await.unwrap();
        engine.save_rule(exchange, rule("R20", r"\.vip", "events.notification.vip", 100, false)).await.unwrap();
        engine
            .save_rule(exchange, rule("R99", r"^order\.cancelled", "events.audit.cancelled", 10, true))
            .await
            .unwrap();

        let mut payload = Fields::new();
        payload.insert("orderId".into(), "1".into());
        let result = engine.route(exchange, "order.cancelled.vip.eu.v1", payload).await.unwrap();

        assert_eq!(result.routed_to.len(), 1);
        assert_eq!(result.routed_to[0].log, "events.audit.cancelled");
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let engine = TopicRoutingEngine::new(Arc::new(MemoryStore::new()));
        engine.save_rule("ex", rule("R1", "^a", "dest", 10, false)).await.unwrap();
        engine.delete_rule("ex", "R1").await.unwrap();
        assert!(engine.get_rule("ex", "R1").await.is_err());
    }
}
