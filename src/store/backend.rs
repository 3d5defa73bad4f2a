//! The `StoreBackend` trait: a typed wrapper over a Redis-style log/KV store.
//!
//! Two implementations exist: [`crate::store::memory::MemoryStore`] (no
//! external dependencies, used by default and by every unit/scenario test)
//! and [`crate::store::redis::RedisStore`] (real Redis, real scripts, real
//! keyspace notifications).

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::error::StoreError;
use super::model::{Entry, Fields, PendingEntry};

/// A single channel message received via pub/sub.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: String,
    pub payload: String,
}

/// Stream of `(key, value)` pairs that just expired, used to drive the
/// Request/Reply timeout listener (§4.8).
pub type ExpiredKeyStream = BoxStream<'static, String>;

#[async_trait]
pub trait StoreBackend: Send + Sync {
    // -- Logs -----------------------------------------------------------
    async fn append(&self, log: &str, fields: Fields) -> Result<String, StoreError>;
    async fn range(&self, log: &str, count: usize) -> Result<Vec<Entry>, StoreError>;
    async fn delete(&self, log: &str) -> Result<(), StoreError>;
    async fn len(&self, log: &str) -> Result<u64, StoreError>;

    // -- Consumer groups --------------------------------------------------
    async fn ensure_group(&self, log: &str, group: &str) -> Result<(), StoreError>;
    async fn group_read(
        &self,
        log: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<Entry>, StoreError>;
    async fn ack(&self, log: &str, group: &str, id: &str) -> Result<(), StoreError>;
    async fn claim(
        &self,
        log: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<Entry>, StoreError>;
    async fn pending(
        &self,
        log: &str,
        group: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<PendingEntry>, StoreError>;

    // -- Key/value with TTL -----------------------------------------------
    async fn kv_set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<std::time::Duration>,
    ) -> Result<(), StoreError>;
    async fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn kv_del(&self, key: &str) -> Result<(), StoreError>;

    // -- Hashes ------------------------------------------------------------
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;
    async fn hgetall(&self, key: &str) -> Result<Fields, StoreError>;
    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError>;
    async fn hdel_all(&self, key: &str) -> Result<(), StoreError>;

    // -- Sorted sets ---------------------------------------------------------
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;
    async fn zrangebyscore(
        &self,
        key: &str,
        max_score: f64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;
    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn zcard(&self, key: &str) -> Result<u64, StoreError>;

    // -- Pub/Sub -------------------------------------------------------------
    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, StoreError>;
    async fn subscribe_pattern(
        &self,
        pattern: &str,
    ) -> Result<BoxStream<'static, ChannelMessage>, StoreError>;

    /// Stream of keys observed to expire (used only by the timeout listener).
    async fn expired_keys(&self) -> Result<ExpiredKeyStream, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
    fn backend_name(&self) -> &'static str;
}
