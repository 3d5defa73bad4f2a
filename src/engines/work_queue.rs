//! Work-Queue / competing-consumers engine (C4, §4.4).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::event_bus::EventBus;
use crate::store::{Entry, Fields, ScriptLibrary};

use super::error::EngineError;

const DEFAULT_WORKERS: usize = 4;
const SHARED_GROUP: &str = "work-queue-workers";

pub type SuccessPredicate = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

fn default_predicate() -> SuccessPredicate {
    Arc::new(|entry: &Entry| entry.field("processingType") == Some("OK"))
}

#[derive(Clone)]
pub struct WorkQueueConfig {
    pub main_log: String,
    pub n_workers: usize,
    pub min_idle_ms: u64,
    pub max_deliveries: u64,
    pub batch_size: usize,
    pub tick: Duration,
}

impl WorkQueueConfig {
    pub fn new(main_log: impl Into<String>) -> Self {
        Self {
            main_log: main_log.into(),
            n_workers: DEFAULT_WORKERS,
            min_idle_ms: 100,
            max_deliveries: 3,
            batch_size: 10,
            tick: Duration::from_millis(100),
        }
    }

    fn dlq_log(&self) -> String {
        format!("{}:dlq", self.main_log)
    }

    fn done_log(&self, worker: usize) -> String {
        format!("{}:done:worker-{worker}", self.main_log)
    }
}

pub struct WorkQueueEngine {
    store: Arc<dyn ScriptLibrary>,
    bus: EventBus,
    config: WorkQueueConfig,
    predicate: SuccessPredicate,
}

impl WorkQueueEngine {
    pub fn new(store: Arc<dyn ScriptLibrary>, bus: EventBus, config: WorkQueueConfig) -> Self {
        Self {
            store,
            bus,
            config,
            predicate: default_predicate(),
        }
    }

    pub fn with_predicate(mut self, predicate: SuccessPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub async fn produce(&self, processing_type: &str) -> Result<String, EngineError> {
        let mut fields = Fields::new();
        fields.insert("processingType".to_string(), processing_type.to_string());
        let id = self.store.append(&self.config.main_log, fields).await?;
        self.bus.info(format!("work-queue produced {id}"));
        Ok(id)
    }

    pub async fn clear(&self) -> Result<(), EngineError> {
        self.store.delete(&self.config.main_log).await?;
        self.store.delete(&self.config.dlq_log()).await?;
        for i in 0..self.config.n_workers {
            self.store.delete(&self.config.done_log(i)).await?;
        }
        self.store.ensure_group(&self.config.main_log, SHARED_GROUP).await?;
        Ok(())
    }

    pub async fn done_count(&self, worker: usize) -> Result<u64, EngineError> {
        Ok(self.store.len(&self.config.done_log(worker)).await?)
    }

    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        (0..self.config.n_workers)
            .map(|i| {
                let engine = Arc::clone(self);
                let mut shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let consumer = format!("worker-{i}");
                    if let Err(e) = engine.store.ensure_group(&engine.config.main_log, SHARED_GROUP).await {
                        tracing::error!(error = %e, "work-queue worker failed to ensure group");
                        return;
                    }
                    loop {
                        if *shutdown.borrow() {
                            break;
                        }
                        if let Err(e) = engine.run_once(&consumer, i).await {
                            tracing::warn!(error = %e, worker = %consumer, "work-queue iteration failed");
                        }
                        tokio::select! {
                            _ = shutdown.changed() => if *shutdown.borrow() { break },
                            _ = tokio::time::sleep(engine.config.tick) => {}
                        }
                    }
                })
            })
            .collect()
    }

    async fn run_once(&self, consumer: &str, worker: usize) -> Result<(), EngineError> {
        let result = self
            .store
            .read_claim_or_dlq(
                &self.config.main_log,
                &self.config.dlq_log(),
                SHARED_GROUP,
                consumer,
                self.config.min_idle_ms,
                self.config.batch_size,
                self.config.max_deliveries,
            )
            .await?;

        for routing in &result.dlq_routings {
            self.bus.publish(crate::store::BusEvent {
                event_type: crate::store::EventType::MessageToDlq,
                message_id: Some(routing.orig_id.clone()),
                payload: None,
                stream_name: Some(self.config.main_log.clone()),
                consumer: Some(consumer.to_string()),
                details: Some(format!("routed to {}", routing.new_dlq_id)),
                timestamp: chrono::Utc::now(),
            });
        }

        for entry in result.ready_entries {
            if (self.predicate)(&entry) {
                self.store.append(&self.config.done_log(worker), entry.fields.clone()).await?;
                self.store.ack(&self.config.main_log, SHARED_GROUP, &entry.id).await?;
                self.bus.publish(crate::store::BusEvent {
                    event_type: crate::store::EventType::MessageProcessed,
                    message_id: Some(entry.id),
                    payload: None,
                    stream_name: Some(self.config.main_log.clone()),
                    consumer: Some(consumer.to_string()),
                    details: None,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn successful_entries_land_in_done_log_and_are_acked() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::new());
        let bus = EventBus::new(16);
        let config = WorkQueueConfig::new("wq");
        let engine = Arc::new(WorkQueueEngine::new(Arc::clone(&store), bus, config.clone()));
        store.ensure_group(&config.main_log, SHARED_GROUP).await.unwrap();

        engine.produce("OK").await.unwrap();
        engine.run_once("worker-0", 0).await.unwrap();

        assert_eq!(engine.done_count(0).await.unwrap(), 1);
        let pending = store.pending(&config.main_log, SHARED_GROUP, 0, 10).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn failing_entries_stay_pending_for_retry() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::new());
        let bus = EventBus::new(16);
        let config = WorkQueueConfig::new("wq2");
        let engine = Arc::new(WorkQueueEngine::new(Arc::clone(&store), bus, config.clone()));
        store.ensure_group(&config.main_log, SHARED_GROUP).await.unwrap();

        engine.produce("Error").await.unwrap();
        engine.run_once("worker-0", 0).await.unwrap();

        assert_eq!(engine.done_count(0).await.unwrap(), 0);
        let pending = store.pending(&config.main_log, SHARED_GROUP, 0, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
    }
}
