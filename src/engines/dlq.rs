//! Dead-Letter pattern engine (C3, §4.3).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{Message, ScriptLibrary};

use super::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqConfig {
    pub main_log: String,
    pub dlq_log: String,
    pub group: String,
    pub consumer: String,
    pub min_idle_ms: u64,
    pub max_deliveries: u64,
    pub batch_size: usize,
}

impl DlqConfig {
    pub fn new(main_log: impl Into<String>, group: impl Into<String>) -> Self {
        let main_log = main_log.into();
        let dlq_log = format!("{main_log}:dlq");
        Self {
            main_log,
            dlq_log,
            group: group.into(),
            consumer: "consumer-1".to_string(),
            min_idle_ms: 5_000,
            max_deliveries: 3,
            batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub message: Option<Message>,
    pub acked: bool,
}

pub struct DlqEngine {
    store: Arc<dyn ScriptLibrary>,
}

impl DlqEngine {
    pub fn new(store: Arc<dyn ScriptLibrary>) -> Self {
        Self { store }
    }

    pub async fn init(&self, config: &DlqConfig) -> Result<(), EngineError> {
        self.store.ensure_group(&config.main_log, &config.group).await?;
        Ok(())
    }

    pub async fn produce(&self, stream_name: &str, payload: crate::store::Fields) -> Result<String, EngineError> {
        Ok(self.store.append(stream_name, payload).await?)
    }

    /// §4.2.1 + §4.3: claim idle entries, route exhausted ones to the DLQ,
    /// deliver the rest as `Message`s tagged with retry provenance.
    pub async fn next_messages(&self, config: &DlqConfig) -> Result<Vec<Message>, EngineError> {
        let result = self
            .store
            .read_claim_or_dlq(
                &config.main_log,
                &config.dlq_log,
                &config.group,
                &config.consumer,
                config.min_idle_ms,
                config.batch_size,
                config.max_deliveries,
            )
            .await?;

        if result.ready_entries.is_empty() {
            return Ok(Vec::new());
        }

        // read_claim_or_dlq already updated the PEL; consult it once more to
        // recover each entry's current delivery count (>1 means this batch
        // reclaimed it rather than delivering it fresh).
        let pel = self.store.pending(&config.main_log, &config.group, 0, usize::MAX).await?;
        let counts: std::collections::HashMap<&str, u64> =
            pel.iter().map(|p| (p.id.as_str(), p.delivery_count)).collect();

        Ok(result
            .ready_entries
            .into_iter()
            .map(|entry| {
                let delivery_count = counts.get(entry.id.as_str()).copied().unwrap_or(1);
                Message {
                    id: entry.id,
                    is_retry: delivery_count > 1,
                    delivery_count,
                    fields: entry.fields,
                    log: config.main_log.clone(),
                    group: config.group.clone(),
                    consumer: config.consumer.clone(),
                }
            })
            .collect())
    }

    pub async fn acknowledge(&self, log: &str, group: &str, id: &str) -> Result<(), EngineError> {
        Ok(self.store.ack(log, group, id).await?)
    }

    /// Consume exactly one message; ack iff `should_succeed`. If no message
    /// is currently ready, returns `ProcessResult { message: None, .. }`.
    pub async fn process_one(
        &self,
        config: &DlqConfig,
        should_succeed: bool,
    ) -> Result<ProcessResult, EngineError> {
        let mut single = config.clone();
        single.batch_size = 1;
        let mut messages = self.next_messages(&single).await?;
        let Some(message) = messages.pop() else {
            return Ok(ProcessResult { message: None, acked: false });
        };

        if should_succeed {
            self.acknowledge(&config.main_log, &config.group, &message.id).await?;
            Ok(ProcessResult { message: Some(message), acked: true })
        } else {
            Ok(ProcessResult { message: Some(message), acked: false })
        }
    }

    pub async fn pending(
        &self,
        log: &str,
        group: &str,
        count: usize,
    ) -> Result<Vec<crate::store::PendingEntry>, EngineError> {
        Ok(self.store.pending(log, group, 0, count).await?)
    }

    pub async fn messages(&self, log: &str, count: usize) -> Result<Vec<crate::store::Entry>, EngineError> {
        Ok(self.store.range(log, count).await?)
    }

    pub async fn cleanup(&self, config: &DlqConfig) -> Result<(), EngineError> {
        self.store.delete(&config.main_log).await?;
        self.store.delete(&config.dlq_log).await?;
        self.store.ensure_group(&config.main_log, &config.group).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fields, MemoryStore};

    fn engine() -> DlqEngine {
        DlqEngine::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn dlq_monotonic_delivery_after_k_failures() {
        let engine = engine();
        let config = DlqConfig {
            min_idle_ms: 50,
            max_deliveries: 2,
            ..DlqConfig::new("L", "G")
        };
        engine.init(&config).await.unwrap();

        let mut fields = Fields::new();
        fields.insert("order_id".into(), "9000".into());
        engine.produce("L", fields).await.unwrap();

        // First delivery (to consumer-1), never acked.
        let first = engine.next_messages(&config).await.unwrap();
        assert_eq!(first.len(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        let second = engine.next_messages(&config).await.unwrap();
        assert_eq!(second.len(), 1, "second claim should reclaim the idle entry");

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        let third = engine.next_messages(&config).await.unwrap();
        assert!(third.is_empty(), "entry should have moved to the DLQ by now");

        let dlq_entries = engine.messages(&config.dlq_log, 10).await.unwrap();
        assert_eq!(dlq_entries.len(), 1);
        assert_eq!(dlq_entries[0].field("order_id"), Some("9000"));

        let pending = engine.pending(&config.main_log, &config.group, 10).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn process_one_acks_only_on_success() {
        let engine = engine();
        let config = DlqConfig::new("W", "G");
        engine.init(&config).await.unwrap();
        engine.produce("W", Fields::new()).await.unwrap();

        let failed = engine.process_one(&config, false).await.unwrap();
        assert!(failed.message.is_some());
        assert!(!failed.acked);

        let pending = engine.pending(&config.main_log, &config.group, 10).await.unwrap();
        assert_eq!(pending.len(), 1, "unacked message stays pending");
    }
}
