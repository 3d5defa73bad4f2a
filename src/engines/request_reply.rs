//! Request/Reply engine with correlated, key-expiration-driven timeout (C8, §4.8).

use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::event_bus::EventBus;
use crate::store::scripts::shadow_key;
use crate::store::{Fields, ScriptLibrary};

use super::error::EngineError;

pub struct RequestReplyEngine {
    store: Arc<dyn ScriptLibrary>,
    bus: EventBus,
}

impl RequestReplyEngine {
    pub fn new(store: Arc<dyn ScriptLibrary>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// §4.2.3: opens a correlation and appends the request. Returns the
    /// correlation id the caller must use for the eventual `response`.
    pub async fn send(
        &self,
        business_id: &str,
        response_log: &str,
        timeout_sec: u64,
        request_log: &str,
        payload: Fields,
    ) -> Result<String, EngineError> {
        let corr_id = Uuid::new_v4().to_string();
        self.store
            .request(&corr_id, business_id, response_log, timeout_sec, request_log, payload)
            .await?;
        self.bus.info(format!("request/reply opened correlation {corr_id}"));
        Ok(corr_id)
    }

    /// §4.2.4: closes a correlation, deleting the timeout key before publishing.
    pub async fn respond(
        &self,
        corr_id: &str,
        business_id: &str,
        response_log: &str,
        payload: Fields,
    ) -> Result<String, EngineError> {
        Ok(self.store.response(corr_id, business_id, response_log, payload).await?)
    }

    /// Spawns the timeout listener: subscribes to the store's expired-key
    /// stream and synthesizes a `TIMEOUT` response for every `req.timeout:*`
    /// key it observes, unless a real response already raced it (in which
    /// case the key is already gone and the store simply never reports it).
    pub fn spawn_timeout_listener(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut expired = match engine.store.expired_keys().await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "timeout listener failed to subscribe to expired keys");
                    return;
                }
            };
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                    key = expired.next() => {
                        match key {
                            Some(key) => {
                                if let Some(corr_id) = key.strip_prefix("req.timeout:") {
                                    if let Err(e) = engine.handle_timeout(corr_id).await {
                                        tracing::warn!(error = %e, corr_id, "failed to synthesize timeout response");
                                    }
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        })
    }

    async fn handle_timeout(&self, corr_id: &str) -> Result<(), EngineError> {
        let shadow = self.store.hgetall(&shadow_key(corr_id)).await?;
        let Some(business_id) = shadow.get("businessId").cloned() else {
            // Shadow already gone (or never existed) — a real response won the race.
            return Ok(());
        };
        let Some(response_log) = shadow.get("responseStream").cloned() else {
            return Ok(());
        };

        let mut payload = Fields::new();
        payload.insert("status".to_string(), "TIMEOUT".to_string());
        payload.insert("correlationId".to_string(), corr_id.to_string());
        payload.insert("businessId".to_string(), business_id);
        self.store.append(&response_log, payload).await?;

        self.store.hdel_all(&shadow_key(corr_id)).await?;
        self.bus.info(format!("request/reply correlation {corr_id} timed out"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn response_before_timeout_suppresses_synthetic_timeout() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::with_sweep_interval(Duration::from_millis(10)));
        let bus = EventBus::new(16);
        let engine = Arc::new(RequestReplyEngine::new(Arc::clone(&store), bus));

        let corr_id = engine.send("biz-1", "resp.log", 1, "req.log", Fields::new()).await.unwrap();
        engine.respond(&corr_id, "biz-1", "resp.log", Fields::new()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let entries = store.range("resp.log", 10).await.unwrap();
        assert_eq!(entries.len(), 1, "only the real response, no synthetic timeout");
        assert_ne!(entries[0].field("status"), Some("TIMEOUT"));
    }

    #[tokio::test]
    async fn unanswered_request_produces_timeout_response() {
        let store: Arc<dyn ScriptLibrary> = Arc::new(MemoryStore::with_sweep_interval(Duration::from_millis(10)));
        let bus = EventBus::new(16);
        let engine = Arc::new(RequestReplyEngine::new(Arc::clone(&store), bus));
        let (_tx, rx) = watch::channel(false);
        let listener = engine.spawn_timeout_listener(rx);

        let corr_id = engine.send("biz-2", "resp.log2", 1, "req.log2", Fields::new()).await.unwrap();

        tokio::time::timeout(Duration::from_millis(1200), async {
            loop {
                let entries = store.range("resp.log2", 10).await.unwrap();
                if !entries.is_empty() {
                    assert_eq!(entries[0].field("status"), Some("TIMEOUT"));
                    assert_eq!(entries[0].field("correlationId"), Some(corr_id.as_str()));
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        listener.abort();
    }
}
