//! Scheduler engine: delayed messages via a time-sorted set plus a poller (C9, §4.9).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::event_bus::EventBus;
use crate::store::{ScheduledItem, ScriptLibrary};

use super::error::EngineError;

const INDEX_KEY: &str = "scheduled.index";
const REMINDERS_LOG: &str = "reminders.v1";
const DEFAULT_BATCH: usize = 10;

fn item_key(id: &str) -> String {
    format!("scheduled:message:{id}")
}

fn member_for(id: &str) -> String {
    format!("message:{id}")
}

fn id_from_member(member: &str) -> Option<&str> {
    member.strip_prefix("message:")
}

pub struct SchedulerEngine {
    store: Arc<dyn ScriptLibrary>,
    bus: EventBus,
    tick: Duration,
}

impl SchedulerEngine {
    pub fn new(store: Arc<dyn ScriptLibrary>, bus: EventBus, tick: Duration) -> Self {
        Self { store, bus, tick }
    }

    pub async fn schedule(&self, item: ScheduledItem) -> Result<(), EngineError> {
        let now = Utc::now().timestamp_millis();
        if item.scheduled_for_epoch_millis <= now {
            return Err(EngineError::Validation("scheduledFor must be in the future".into()));
        }
        let json = serde_json::to_string(&item)
            .map_err(|e| EngineError::Validation(format!("could not encode scheduled item: {e}")))?;
        self.store.hset(&item_key(&item.id), "payload", &json).await?;
        self.store
            .zadd(INDEX_KEY, &member_for(&item.id), item.scheduled_for_epoch_millis as f64)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<ScheduledItem, EngineError> {
        let fields = self.store.hgetall(&item_key(id)).await?;
        let json = fields
            .get("payload")
            .ok_or_else(|| EngineError::NotFound(format!("scheduled item '{id}'")))?;
        serde_json::from_str(json).map_err(|e| EngineError::Protocol(e.to_string()))
    }

    pub async fn delete(&self, id: &str) -> Result<(), EngineError> {
        self.store.hdel_all(&item_key(id)).await?;
        self.store.zrem(INDEX_KEY, &member_for(id)).await?;
        Ok(())
    }

    pub async fn pending_count(&self) -> Result<u64, EngineError> {
        Ok(self.store.zcard(INDEX_KEY).await?)
    }

    pub async fn list(&self) -> Result<Vec<ScheduledItem>, EngineError> {
        let members = self.store.zrangebyscore(INDEX_KEY, f64::MAX, usize::MAX).await?;
        let mut items = Vec::with_capacity(members.len());
        for member in members {
            if let Some(id) = id_from_member(&member) {
                if let Ok(item) = self.get(id).await {
                    items.push(item);
                }
            }
        }
        Ok(items)
    }

    pub async fn clear(&self) -> Result<(), EngineError> {
        self.store.delete(REMINDERS_LOG).await?;
        let due = self.store.zrangebyscore(INDEX_KEY, f64::MAX, usize::MAX).await?;
        for member in due {
            if let Some(id) = id_from_member(&member) {
                self.store.hdel_all(&item_key(id)).await?;
            }
            self.store.zrem(INDEX_KEY, &member).await?;
        }
        Ok(())
    }

    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut shutdown = shutdown;
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if let Err(e) = engine.poll_once().await {
                    tracing::warn!(error = %e, "scheduler poll failed");
                }
                tokio::select! {
                    _ = shutdown.changed() => if *shutdown.borrow() { break },
                    _ = tokio::time::sleep(engine.tick) => {}
                }
            }
        })
    }

    async fn poll_once(&self) -> Result<(), EngineError> {
        let now = Utc::now().timestamp_millis() as f64;
        let due = self.store.zrangebyscore(INDEX_KEY, now, DEFAULT_BATCH).await?;
        for member in due {
            let Some(id) = id_from_member(&member) else { continue };
            let fields = self.store.hgetall(&item_key(id)).await?;
            let Some(json) = fields.get("payload") else {
                // Already materialized by a racing poll tick; just drop the stale index entry.
                self.store.zrem(INDEX_KEY, &member).await?;
                continue;
            };
            let mut reminder = crate::store::Fields::new();
            reminder.insert("id".to_string(), id.to_string());
            reminder.insert("payload".to_string(), json.clone());
            self.store.append(REMINDERS_LOG, reminder).await?;
            self.store.zrem(INDEX_KEY, &member).await?;
            self.store.hdel_all(&item_key(id)).await?;
            self.bus.info(format!("scheduler materialized {id}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn item(id: &str, offset_ms: i64) -> ScheduledItem {
        let now = Utc::now().timestamp_millis();
        ScheduledItem {
            id: id.to_string(),
            title: "reminder".to_string(),
            description: String::new(),
            scheduled_for_epoch_millis: now + offset_ms,
            created_at_epoch_millis: now,
        }
    }

    #[tokio::test]
    async fn rejects_times_in_the_past() {
        let engine = SchedulerEngine::new(Arc::new(MemoryStore::new()), EventBus::new(16), Duration::from_millis(50));
        assert!(engine.schedule(item("late", -1000)).await.is_err());
    }

    #[tokio::test]
    async fn due_item_materializes_within_one_poll() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::new());
        let engine = Arc::new(SchedulerEngine::new(Arc::clone(&store), EventBus::new(16), Duration::from_millis(50)));
        engine.schedule(item("r1", 200)).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let handle = engine.spawn(rx);

        tokio::time::timeout(Duration::from_millis(700), async {
            loop {
                let entries = store.range(REMINDERS_LOG, 10).await.unwrap();
                if !entries.is_empty() {
                    assert_eq!(entries[0].field("id"), Some("r1"));
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(engine.pending_count().await.unwrap(), 0);
        handle.abort();
    }
}
