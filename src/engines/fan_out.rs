//! Fan-Out (durable broadcast) engine (C5, §4.5).
//!
//! Like the work-queue engine but each worker owns a private consumer
//! group, so every entry appended to the input log is delivered to every
//! worker, not split across them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::event_bus::EventBus;
use crate::store::{Fields, ScriptLibrary};

use super::error::EngineError;

const DEFAULT_WORKERS: usize = 4;

#[derive(Clone)]
pub struct FanOutConfig {
    pub main_log: String,
    pub n_workers: usize,
    pub min_idle_ms: u64,
    pub max_deliveries: u64,
    pub batch_size: usize,
    pub tick: Duration,
}

impl FanOutConfig {
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

    fn group(&self, worker: usize) -> String {
        format!("{}:group-{worker}", self.main_log)
    }

    fn dlq_log(&self, worker: usize) -> String {
        format!("{}:dlq:worker-{worker}", self.main_log)
    }

    fn done_log(&self, worker: usize) -> String {
        format!("{}:done:worker-{worker}", self.main_log)
    }
}

pub struct FanOutEngine {
    store: Arc<dyn ScriptLibrary>,
    bus: EventBus,
    config: FanOutConfig,
}

impl FanOutEngine {
    pub fn new(store: Arc<dyn ScriptLibrary>, bus: EventBus, config: FanOutConfig) -> Self {
        Self { store, bus, config }
    }

    pub async fn produce(&self, fields: Fields) -> Result<String, EngineError> {
        Ok(self.store.append(&self.config.main_log, fields).await?)
    }

    pub async fn clear(&self) -> Result<(), EngineError> {
        self.store.delete(&self.config.main_log).await?;
        for i in 0..self.config.n_workers {
            self.store.delete(&self.config.dlq_log(i)).await?;
            self.store.delete(&self.config.done_log(i)).await?;
            self.store.ensure_group(&self.config.main_log, &self.config.group(i)).await?;
        }
        Ok(())
    }

    pub async fn done_count(&self, worker: usize) -> Result<u64, EngineError> {
        Ok(self.store.len(&self.config.done_log(worker)).await?)
    }

    pub async fn dlq_count(&self, worker: usize) -> Result<u64, EngineError> {
        Ok(self.store.len(&self.config.dlq_log(worker)).await?)
    }

    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        (0..self.config.n_workers)
            .map(|i| {
                let engine = Arc::clone(self);
                let mut shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let group = engine.config.group(i);
                    let consumer = format!("worker-{i}");
                    if let Err(e) = engine.store.ensure_group(&engine.config.main_log, &group).await {
                        tracing::error!(error = %e, "fan-out worker failed to ensure group");
                        return;
                    }
                    loop {
                        if *shutdown.borrow() {
                            break;
                        }
                        if let Err(e) = engine.run_once(i, &consumer).await {
                            tracing::warn!(error = %e, worker = %consumer, "fan-out iteration failed");
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

    async fn run_once(&self, worker: usize, consumer: &str) -> Result<(), EngineError> {
        let group = self.config.group(worker);
        let result = self
            .store
            .read_claim_or_dlq(
                &self.config.main_log,
                &self.config.dlq_log(worker),
                &group,
                consumer,
                self.config.min_idle_ms,
                self.config.batch_size,
                self.config.max_deliveries,
            )
            .await?;

        for entry in result.ready_entries {
            let succeeded = entry.field("processingType") != Some("Error");
            if succeeded {
                self.store.append(&self.config.done_log(worker), entry.fields.clone()).await?;
                self.store.ack(&self.config.main_log, &group, &entry.id).await?;
            }
        }

        if !result.dlq_routings.is_empty() {
            self.bus.info(format!(
                "fan-out worker-{worker} routed {} entries to dlq",
                result.dlq_routings.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn every_group_observes_every_entry() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::new());
        let bus = EventBus::new(16);
        let config = FanOutConfig { n_workers: 2, ..FanOutConfig::new("fanout") };
        let engine = Arc::new(FanOutEngine::new(Arc::clone(&store), bus, config.clone()));
        for i in 0..config.n_workers {
            store.ensure_group(&config.main_log, &config.group(i)).await.unwrap();
        }

        for _ in 0..3 {
            let mut fields = Fields::new();
            fields.insert("processingType".into(), "OK".into());
            engine.produce(fields).await.unwrap();
        }

        for i in 0..config.n_workers {
            engine.run_once(i, &format!("worker-{i}")).await.unwrap();
            assert_eq!(engine.done_count(i).await.unwrap(), 3);
        }
    }

    #[tokio::test]
    async fn failures_eventually_reach_the_per_worker_dlq() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::new());
        let bus = EventBus::new(16);
        let config = FanOutConfig {
            n_workers: 1,
            min_idle_ms: 20,
            max_deliveries: 2,
            ..FanOutConfig::new("fanout-fail")
        };
        let engine = Arc::new(FanOutEngine::new(Arc::clone(&store), bus, config.clone()));
        store.ensure_group(&config.main_log, &config.group(0)).await.unwrap();

        let mut fields = Fields::new();
        fields.insert("processingType".into(), "Error".into());
        engine.produce(fields).await.unwrap();

        engine.run_once(0, "worker-0").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        engine.run_once(0, "worker-0").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        engine.run_once(0, "worker-0").await.unwrap();

        assert_eq!(engine.dlq_count(0).await.unwrap(), 1);
        assert_eq!(engine.done_count(0).await.unwrap(), 0);
    }
}
