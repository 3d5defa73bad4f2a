//! Stream Monitor: polls configured logs and turns activity into event-bus events (C11, §4.11).
//!
//! Uses a dedicated consumer group per monitored log — never an
//! application group — so the monitor never competes with a real consumer
//! for deliveries (§9).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::event_bus::EventBus;
use crate::store::{BusEvent, ScriptLibrary};

const MONITOR_CONSUMER: &str = "monitor";
const BATCH: usize = 50;

fn monitor_group(log: &str) -> String {
    format!("__monitor__:{log}")
}

pub struct StreamMonitor {
    store: Arc<dyn ScriptLibrary>,
    bus: EventBus,
    logs: Vec<String>,
    tick: Duration,
}

impl StreamMonitor {
    pub fn new(store: Arc<dyn ScriptLibrary>, bus: EventBus, logs: Vec<String>, tick: Duration) -> Self {
        Self { store, bus, logs, tick }
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let mut shutdown = shutdown;
        tokio::spawn(async move {
            for log in &self.logs {
                if let Err(e) = self.store.ensure_group(log, &monitor_group(log)).await {
                    tracing::error!(error = %e, log = %log, "monitor failed to ensure group");
                }
            }
            loop {
                if *shutdown.borrow() {
                    break;
                }
                for log in &self.logs {
                    if let Err(e) = self.poll_log(log).await {
                        tracing::warn!(error = %e, log = %log, "monitor poll failed");
                    }
                }
                tokio::select! {
                    _ = shutdown.changed() => if *shutdown.borrow() { break },
                    _ = tokio::time::sleep(self.tick) => {}
                }
            }
        })
    }

    async fn poll_log(&self, log: &str) -> Result<(), crate::store::StoreError> {
        let group = monitor_group(log);
        let entries = self.store.group_read(log, &group, MONITOR_CONSUMER, BATCH).await?;
        for entry in &entries {
            self.bus.produced(log, entry);
            self.store.ack(log, &group, &entry.id).await?;
        }
        Ok(())
    }

    pub fn emit_deleted(&self, log: &str, id: &str) {
        self.bus.publish(BusEvent {
            event_type: crate::store::EventType::MessageDeleted,
            message_id: Some(id.to_string()),
            payload: None,
            stream_name: Some(log.to_string()),
            consumer: None,
            details: None,
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn emit_reclaimed(&self, log: &str, id: &str, consumer: &str) {
        self.bus.publish(BusEvent {
            event_type: crate::store::EventType::MessageReclaimed,
            message_id: Some(id.to_string()),
            payload: None,
            stream_name: Some(log.to_string()),
            consumer: Some(consumer.to_string()),
            details: None,
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fields, MemoryStore};

    #[tokio::test]
    async fn produced_event_observed_before_next_tick() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::new());
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        let monitor = Arc::new(StreamMonitor::new(Arc::clone(&store), bus, vec!["watched".to_string()], Duration::from_millis(30)));
        let (_tx, rx) = watch::channel(false);
        let handle = monitor.spawn(rx);

        let mut fields = Fields::new();
        fields.insert("k".into(), "v".into());
        store.append("watched", fields).await.unwrap();

        let event = tokio::time::timeout(Duration::from_millis(300), sub.recv()).await.unwrap().unwrap();
        assert_eq!(event.event_type, crate::store::EventType::MessageProduced);
        assert_eq!(event.stream_name.as_deref(), Some("watched"));

        handle.abort();
    }

    #[tokio::test]
    async fn monitor_group_is_independent_of_application_group() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::new());
        store.ensure_group("L", "app-group").await.unwrap();
        store.append("L", Fields::new()).await.unwrap();
        store.group_read("L", "app-group", "c1", 10).await.unwrap();

        let bus = EventBus::new(16);
        let monitor = StreamMonitor::new(Arc::clone(&store), bus, vec!["L".to_string()], Duration::from_millis(30));
        monitor.poll_log("L").await.unwrap();

        // The application group's pending entry is untouched by the monitor's ack.
        let pending = store.pending("L", "app-group", 0, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
    }
}
