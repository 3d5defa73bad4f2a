//! Pub/Sub and pattern-pub/sub engines (C10, §4.10).

use std::sync::Arc;

use futures::stream::BoxStream;

use crate::store::{ChannelMessage, ScriptLibrary};

use super::error::EngineError;

pub struct PubSubEngine {
    store: Arc<dyn ScriptLibrary>,
}

impl PubSubEngine {
    pub fn new(store: Arc<dyn ScriptLibrary>) -> Self {
        Self { store }
    }

    /// Returns the subscriber count observed at publish time.
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<u64, EngineError> {
        Ok(self.store.publish(channel, payload).await?)
    }

    pub async fn subscribe(&self, pattern: &str) -> Result<BoxStream<'static, ChannelMessage>, EngineError> {
        Ok(self.store.subscribe_pattern(pattern).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use futures::StreamExt;

    #[tokio::test]
    async fn exact_channel_delivers_to_subscriber() {
        let engine = PubSubEngine::new(Arc::new(MemoryStore::new()));
        let mut sub = engine.subscribe("orders.created").await.unwrap();
        engine.publish("orders.created", "hello").await.unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_millis(200), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, "hello");
    }

    #[tokio::test]
    async fn pattern_channel_ignores_non_matching_channels() {
        let engine = PubSubEngine::new(Arc::new(MemoryStore::new()));
        let mut sub = engine.subscribe("orders.*").await.unwrap();
        engine.publish("users.created", "ignored").await.unwrap();
        engine.publish("orders.shipped", "seen").await.unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_millis(200), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.channel, "orders.shipped");
    }
}
