//! In-memory store backend.
//!
//! Provides the full log/consumer-group/KV/hash/sorted-set/pub-sub surface
//! without any external dependency, for local development and for every
//! unit and scenario test in this crate. Each [`ScriptLibrary`] operation
//! (claim-or-dlq, route_message, request, response) holds the relevant
//! `RwLock`s for its whole multi-step body, so no other caller observes an
//! intermediate state: the in-memory equivalent of a Lua script's atomicity
//! on real Redis. Scheduler materialization is not part of this
//! guarantee: it is a plain sequence of `StoreBackend` calls that tolerates
//! a racing poll tick (see `engines/scheduler.rs`), not a scripted unit.
//!
//! Key expiration (used by the Request/Reply timeout listener) is
//! approximated with a background sweep rather than exact-tick timers;
//! resolution is configurable and defaults to 50ms.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{Notify, broadcast, watch};

use super::backend::{ChannelMessage, ExpiredKeyStream, StoreBackend};
use super::error::StoreError;
use super::model::{ClaimOrDlqResult, DlqRouting, Entry, Fields, PendingEntry, RouteResult, RoutedDestination};
use super::scripts::{self, ScriptLibrary};

const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 50;

struct PendingRow {
    consumer: String,
    delivered_at: Instant,
    delivery_count: u64,
}

#[derive(Default)]
struct ConsumerGroup {
    last_delivered: u64,
    pending: HashMap<u64, PendingRow>,
}

#[derive(Default)]
struct LogState {
    entries: VecDeque<Entry>,
    next_id: u64,
    groups: HashMap<String, ConsumerGroup>,
}

impl LogState {
    fn next_id_string(&mut self) -> (u64, String) {
        self.next_id += 1;
        let n = self.next_id;
        (n, format!("{}-{}", chrono::Utc::now().timestamp_millis(), n))
    }

    fn find(&self, numeric_id: u64) -> Option<&Entry> {
        self.entries.iter().find(|e| parse_numeric(&e.id) == numeric_id)
    }
}

fn parse_numeric(id: &str) -> u64 {
    id.rsplit('-').next().and_then(|s| s.parse().ok()).unwrap_or(0)
}

struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

struct SharedState {
    logs: RwLock<HashMap<String, LogState>>,
    kv: RwLock<HashMap<String, KvEntry>>,
    hashes: RwLock<HashMap<String, Fields>>,
    zsets: RwLock<HashMap<String, Vec<(String, f64)>>>,
    channel: broadcast::Sender<ChannelMessage>,
    expired: broadcast::Sender<String>,
    notifiers: RwLock<HashMap<String, Arc<Notify>>>,
}

/// In-memory implementation of [`StoreBackend`].
pub struct MemoryStore {
    state: Arc<SharedState>,
    _sweep_shutdown: watch::Sender<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_sweep_interval(Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS))
    }

    pub fn with_sweep_interval(interval: Duration) -> Self {
        let (channel, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        let (expired, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        let state = Arc::new(SharedState {
            logs: RwLock::new(HashMap::new()),
            kv: RwLock::new(HashMap::new()),
            hashes: RwLock::new(HashMap::new()),
            zsets: RwLock::new(HashMap::new()),
            channel,
            expired,
            notifiers: RwLock::new(HashMap::new()),
        });

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let sweep_state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        sweep_expired(&sweep_state);
                    }
                }
            }
        });

        Self {
            state,
            _sweep_shutdown: shutdown_tx,
        }
    }

    fn notifier(&self, log: &str) -> Arc<Notify> {
        if let Some(n) = self.state.notifiers.read().get(log) {
            return Arc::clone(n);
        }
        let mut notifiers = self.state.notifiers.write();
        Arc::clone(notifiers.entry(log.to_string()).or_insert_with(|| Arc::new(Notify::new())))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sweep_expired(state: &SharedState) {
    let now = Instant::now();
    let mut expired_keys = Vec::new();
    {
        let mut kv = state.kv.write();
        kv.retain(|key, entry| {
            let alive = entry.expires_at.is_none_or(|at| at > now);
            if !alive {
                expired_keys.push(key.clone());
            }
            alive
        });
    }
    for key in expired_keys {
        let _ = state.expired.send(key);
    }
}

const REGEX_METACHARS: &str = r".+*?()|[]{}^$\#&~";

fn glob_to_regex(pattern: &str) -> regex::Regex {
    let mut out = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str("[^.]*"),
            c if REGEX_METACHARS.contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    regex::Regex::new(&out).unwrap_or_else(|_| regex::Regex::new("$^").unwrap())
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn append(&self, log: &str, fields: Fields) -> Result<String, StoreError> {
        let id = {
            let mut logs = self.state.logs.write();
            let state = logs.entry(log.to_string()).or_default();
            let (_, id) = state.next_id_string();
            state.entries.push_back(Entry::new(id.clone(), fields));
            id
        };
        self.notifier(log).notify_waiters();
        Ok(id)
    }

    async fn range(&self, log: &str, count: usize) -> Result<Vec<Entry>, StoreError> {
        let logs = self.state.logs.read();
        Ok(logs
            .get(log)
            .map(|s| s.entries.iter().rev().take(count).rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, log: &str) -> Result<(), StoreError> {
        self.state.logs.write().remove(log);
        Ok(())
    }

    async fn len(&self, log: &str) -> Result<u64, StoreError> {
        Ok(self.state.logs.read().get(log).map(|s| s.entries.len() as u64).unwrap_or(0))
    }

    async fn ensure_group(&self, log: &str, group: &str) -> Result<(), StoreError> {
        let mut logs = self.state.logs.write();
        let state = logs.entry(log.to_string()).or_default();
        state.groups.entry(group.to_string()).or_default();
        Ok(())
    }

    async fn group_read(
        &self,
        log: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        let mut logs = self.state.logs.write();
        let state = logs
            .get_mut(log)
            .ok_or_else(|| StoreError::NotFound(format!("log '{log}'")))?;
        let last_delivered = state.groups.entry(group.to_string()).or_default().last_delivered;

        let candidates: Vec<Entry> = state
            .entries
            .iter()
            .filter(|e| parse_numeric(&e.id) > last_delivered)
            .take(count)
            .cloned()
            .collect();

        let cg = state.groups.get_mut(group).expect("just inserted above");
        let now = Instant::now();
        for entry in &candidates {
            let numeric = parse_numeric(&entry.id);
            cg.pending.insert(
                numeric,
                PendingRow {
                    consumer: consumer.to_string(),
                    delivered_at: now,
                    delivery_count: 1,
                },
            );
            cg.last_delivered = cg.last_delivered.max(numeric);
        }
        Ok(candidates)
    }

    async fn ack(&self, log: &str, group: &str, id: &str) -> Result<(), StoreError> {
        let mut logs = self.state.logs.write();
        if let Some(state) = logs.get_mut(log)
            && let Some(cg) = state.groups.get_mut(group)
        {
            cg.pending.remove(&parse_numeric(id));
        }
        Ok(())
    }

    async fn claim(
        &self,
        log: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        let mut logs = self.state.logs.write();
        let state = match logs.get_mut(log) {
            Some(s) => s,
            None => return Ok(vec![]),
        };
        let min_idle = Duration::from_millis(min_idle_ms);
        let now = Instant::now();

        let due_ids: Vec<u64> = match state.groups.get(group) {
            Some(cg) => {
                let mut ids: Vec<u64> = cg
                    .pending
                    .iter()
                    .filter(|(_, row)| now.duration_since(row.delivered_at) >= min_idle)
                    .map(|(id, _)| *id)
                    .collect();
                ids.sort_unstable();
                ids.truncate(count);
                ids
            }
            None => return Ok(vec![]),
        };

        let mut claimed = Vec::with_capacity(due_ids.len());
        for numeric in due_ids {
            let entry = match state.find(numeric) {
                Some(e) => e.clone(),
                None => continue,
            };
            let cg = state.groups.get_mut(group).expect("checked above");
            let row = cg.pending.get_mut(&numeric).expect("selected from pending");
            row.consumer = consumer.to_string();
            row.delivered_at = now;
            row.delivery_count += 1;
            claimed.push(entry);
        }
        Ok(claimed)
    }

    async fn pending(
        &self,
        log: &str,
        group: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<PendingEntry>, StoreError> {
        let logs = self.state.logs.read();
        let state = match logs.get(log) {
            Some(s) => s,
            None => return Ok(vec![]),
        };
        let cg = match state.groups.get(group) {
            Some(g) => g,
            None => return Ok(vec![]),
        };
        let now = Instant::now();
        let min_idle = Duration::from_millis(min_idle_ms);

        let mut rows: Vec<(u64, &PendingRow)> = cg
            .pending
            .iter()
            .map(|(id, row)| (*id, row))
            .filter(|(_, row)| now.duration_since(row.delivered_at) >= min_idle)
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        rows.truncate(count);

        Ok(rows
            .into_iter()
            .filter_map(|(numeric, row)| {
                let id = state.find(numeric)?.id.clone();
                Some(PendingEntry {
                    id,
                    consumer: row.consumer.clone(),
                    idle_ms: now.duration_since(row.delivered_at).as_millis() as u64,
                    delivery_count: row.delivery_count,
                })
            })
            .collect())
    }

    async fn kv_set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.state.kv.write().insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let kv = self.state.kv.read();
        Ok(kv.get(key).and_then(|e| {
            if e.expires_at.is_some_and(|at| at <= Instant::now()) {
                None
            } else {
                Some(e.value.clone())
            }
        }))
    }

    async fn kv_del(&self, key: &str) -> Result<(), StoreError> {
        self.state.kv.write().remove(key);
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.state
            .hashes
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Fields, StoreError> {
        Ok(self.state.hashes.read().get(key).cloned().unwrap_or_default())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        if let Some(map) = self.state.hashes.write().get_mut(key) {
            map.shift_remove(field);
        }
        Ok(())
    }

    async fn hdel_all(&self, key: &str) -> Result<(), StoreError> {
        self.state.hashes.write().remove(key);
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut zsets = self.state.zsets.write();
        let set = zsets.entry(key.to_string()).or_default();
        set.retain(|(m, _)| m != member);
        set.push((member.to_string(), score));
        set.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(())
    }

    async fn zrangebyscore(
        &self,
        key: &str,
        max_score: f64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let zsets = self.state.zsets.read();
        Ok(zsets
            .get(key)
            .map(|set| {
                set.iter()
                    .filter(|(_, score)| *score <= max_score)
                    .take(limit)
                    .map(|(m, _)| m.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(set) = self.state.zsets.write().get_mut(key) {
            set.retain(|(m, _)| m != member);
        }
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.state.zsets.read().get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, StoreError> {
        let msg = ChannelMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        };
        Ok(self.state.channel.send(msg).unwrap_or(0) as u64)
    }

    async fn subscribe_pattern(
        &self,
        pattern: &str,
    ) -> Result<BoxStream<'static, ChannelMessage>, StoreError> {
        let regex = glob_to_regex(pattern);
        let rx = self.state.channel.subscribe();
        let stream = stream::unfold(rx, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => return Some((msg, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |msg| {
            let matches = regex.is_match(&msg.channel);
            async move { matches }
        })
        .boxed();
        Ok(stream)
    }

    async fn expired_keys(&self) -> Result<ExpiredKeyStream, StoreError> {
        let rx = self.state.expired.subscribe();
        let stream = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(key) => return Some((key, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed();
        Ok(stream)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ScriptLibrary for MemoryStore {
    async fn read_claim_or_dlq(
        &self,
        main_log: &str,
        dlq_log: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
        max_deliveries: u64,
    ) -> Result<ClaimOrDlqResult, StoreError> {
        // Held for the whole operation: this is what makes the multi-step
        // claim/dlq/deliver sequence below indivisible from any other
        // caller's point of view.
        let mut logs = self.state.logs.write();
        let min_idle = Duration::from_millis(min_idle_ms);
        let now = Instant::now();

        let due_ids: Vec<u64> = match logs.get(main_log).and_then(|s| s.groups.get(group)) {
            Some(cg) => {
                let mut ids: Vec<u64> = cg
                    .pending
                    .iter()
                    .filter(|(_, row)| now.duration_since(row.delivered_at) >= min_idle)
                    .map(|(id, _)| *id)
                    .collect();
                ids.sort_unstable();
                ids.truncate(count);
                ids
            }
            None => Vec::new(),
        };

        let max_deliveries = max_deliveries.max(1);
        let mut to_dlq = Vec::new();
        let mut to_retry = Vec::new();
        for id in due_ids {
            let delivery_count = logs
                .get(main_log)
                .and_then(|s| s.groups.get(group))
                .and_then(|cg| cg.pending.get(&id))
                .map(|row| row.delivery_count)
                .unwrap_or(0);
            if delivery_count >= max_deliveries {
                to_dlq.push(id);
            } else {
                to_retry.push(id);
            }
        }

        let mut dlq_routings = Vec::new();
        for numeric in to_dlq {
            let entry = {
                let main_state = logs.get(main_log).expect("group existed above");
                match main_state.find(numeric) {
                    Some(e) => e.clone(),
                    None => continue,
                }
            };

            let new_id = {
                let dlq_state = logs.entry(dlq_log.to_string()).or_default();
                let (_, new_id) = dlq_state.next_id_string();
                dlq_state.entries.push_back(Entry::new(new_id.clone(), entry.fields.clone()));
                new_id
            };

            {
                let main_state = logs.get_mut(main_log).expect("checked above");
                if let Some(cg) = main_state.groups.get_mut(group) {
                    cg.pending.remove(&numeric);
                }
            }
            dlq_routings.push(DlqRouting {
                orig_id: entry.id,
                new_dlq_id: new_id,
            });
        }

        let mut ready_entries = Vec::new();
        for numeric in to_retry {
            let main_state = logs.get_mut(main_log).expect("group existed above");
            let entry = match main_state.find(numeric) {
                Some(e) => e.clone(),
                None => continue,
            };
            if let Some(cg) = main_state.groups.get_mut(group)
                && let Some(row) = cg.pending.get_mut(&numeric)
            {
                row.consumer = consumer.to_string();
                row.delivered_at = now;
                row.delivery_count += 1;
            }
            ready_entries.push(entry);
        }

        let remaining = count.saturating_sub(ready_entries.len());
        if remaining > 0 {
            let main_state = logs.entry(main_log.to_string()).or_default();
            let last_delivered = main_state.groups.entry(group.to_string()).or_default().last_delivered;
            let fresh: Vec<Entry> = main_state
                .entries
                .iter()
                .filter(|e| parse_numeric(&e.id) > last_delivered)
                .take(remaining)
                .cloned()
                .collect();
            let cg = main_state.groups.get_mut(group).expect("just inserted above");
            for entry in &fresh {
                let numeric = parse_numeric(&entry.id);
                cg.pending.insert(
                    numeric,
                    PendingRow {
                        consumer: consumer.to_string(),
                        delivered_at: now,
                        delivery_count: 1,
                    },
                );
                cg.last_delivered = cg.last_delivered.max(numeric);
            }
            ready_entries.extend(fresh);
        }

        drop(logs);
        if !dlq_routings.is_empty() {
            self.notifier(dlq_log).notify_waiters();
        }

        Ok(ClaimOrDlqResult {
            ready_entries,
            dlq_routings,
        })
    }

    async fn route_message(
        &self,
        exchange_log: &str,
        routing_key: &str,
        payload: Fields,
    ) -> Result<RouteResult, StoreError> {
        let rules_raw = self.hgetall(&scripts::routing_rules_key(exchange_log)).await?;
        let matched = scripts::matching_rules(&rules_raw, routing_key);

        // Held for the whole fan-out: the exchange append and every
        // destination append below are one indivisible unit.
        let mut logs = self.state.logs.write();

        let mut exchange_fields = payload.clone();
        exchange_fields.insert("_routingKey".to_string(), routing_key.to_string());
        let exchange_state = logs.entry(exchange_log.to_string()).or_default();
        let (_, exchange_id) = exchange_state.next_id_string();
        exchange_state.entries.push_back(Entry::new(exchange_id.clone(), exchange_fields));

        let mut routed_to = Vec::with_capacity(matched.len());
        for rule in &matched {
            let mut dest_fields = payload.clone();
            dest_fields.insert("_ruleId".to_string(), rule.id.clone());
            let dest_state = logs.entry(rule.destination.clone()).or_default();
            let (_, dest_id) = dest_state.next_id_string();
            dest_state.entries.push_back(Entry::new(dest_id.clone(), dest_fields));
            routed_to.push(RoutedDestination { log: rule.destination.clone(), id: dest_id });
        }

        drop(logs);
        self.notifier(exchange_log).notify_waiters();
        for rule in &matched {
            self.notifier(&rule.destination).notify_waiters();
        }

        Ok(RouteResult { exchange_id, routed_to })
    }

    async fn request(
        &self,
        corr_id: &str,
        business_id: &str,
        response_log: &str,
        timeout_sec: u64,
        request_log: &str,
        payload: Fields,
    ) -> Result<String, StoreError> {
        let mut fields = payload;
        fields.insert("correlationId".to_string(), corr_id.to_string());
        fields.insert("businessId".to_string(), business_id.to_string());

        // Held for the whole correlation-opening sequence: the timeout key,
        // shadow hash, and request append all become visible together.
        let mut kv = self.state.kv.write();
        let mut hashes = self.state.hashes.write();
        let mut logs = self.state.logs.write();

        kv.insert(
            scripts::timeout_key(corr_id),
            KvEntry {
                value: business_id.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(timeout_sec)),
            },
        );

        let shadow = hashes.entry(scripts::shadow_key(corr_id)).or_default();
        shadow.insert("businessId".to_string(), business_id.to_string());
        shadow.insert("responseStream".to_string(), response_log.to_string());

        let request_state = logs.entry(request_log.to_string()).or_default();
        let (_, request_id) = request_state.next_id_string();
        request_state.entries.push_back(Entry::new(request_id.clone(), fields));

        drop(logs);
        drop(hashes);
        drop(kv);
        self.notifier(request_log).notify_waiters();

        Ok(request_id)
    }

    async fn response(
        &self,
        corr_id: &str,
        business_id: &str,
        response_log: &str,
        payload: Fields,
    ) -> Result<String, StoreError> {
        let mut fields = payload;
        fields.insert("correlationId".to_string(), corr_id.to_string());
        fields.insert("businessId".to_string(), business_id.to_string());

        // Held for the whole close sequence: the timeout-key delete and the
        // response append become visible together.
        let mut kv = self.state.kv.write();
        let mut logs = self.state.logs.write();

        kv.remove(&scripts::timeout_key(corr_id));

        let response_state = logs.entry(response_log.to_string()).or_default();
        let (_, response_id) = response_state.next_id_string();
        response_state.entries.push_back(Entry::new(response_id.clone(), fields));

        drop(logs);
        drop(kv);
        self.notifier(response_log).notify_waiters();

        Ok(response_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_range() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("k".into(), "v".into());
        let id = store.append("L", fields).await.unwrap();
        let entries = store.range("L", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
    }

    #[tokio::test]
    async fn group_read_ack_is_idempotent() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("k".into(), "v".into());
        store.append("L", fields).await.unwrap();
        store.ensure_group("L", "G").await.unwrap();
        let entries = store.group_read("L", "G", "c1", 10).await.unwrap();
        assert_eq!(entries.len(), 1);

        store.ack("L", "G", &entries[0].id).await.unwrap();
        // Second ack on the same id is a no-op, not an error.
        store.ack("L", "G", &entries[0].id).await.unwrap();

        let pending = store.pending("L", "G", 0, 10).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn claim_reassigns_idle_entries() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("k".into(), "v".into());
        store.append("L", fields).await.unwrap();
        store.ensure_group("L", "G").await.unwrap();
        store.group_read("L", "G", "c1", 10).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let claimed = store.claim("L", "G", "c2", 10, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);

        let pending = store.pending("L", "G", 0, 10).await.unwrap();
        assert_eq!(pending[0].consumer, "c2");
        assert_eq!(pending[0].delivery_count, 2);
    }

    #[tokio::test]
    async fn kv_ttl_expires_and_is_observed() {
        let store = MemoryStore::with_sweep_interval(Duration::from_millis(10));
        let mut expired = store.expired_keys().await.unwrap();
        store.kv_set("k", "v", Some(Duration::from_millis(15))).await.unwrap();
        assert_eq!(store.kv_get("k").await.unwrap(), Some("v".to_string()));

        let key = tokio::time::timeout(Duration::from_millis(500), expired.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key, "k");
        assert_eq!(store.kv_get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zset_range_and_remove() {
        let store = MemoryStore::new();
        store.zadd("z", "a", 10.0).await.unwrap();
        store.zadd("z", "b", 20.0).await.unwrap();
        let due = store.zrangebyscore("z", 15.0, 10).await.unwrap();
        assert_eq!(due, vec!["a".to_string()]);
        store.zrem("z", "a").await.unwrap();
        assert_eq!(store.zcard("z").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pattern_subscribe_matches_glob() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_pattern("orders.*").await.unwrap();
        store.publish("orders.created", "p1").await.unwrap();
        store.publish("users.created", "p2").await.unwrap();
        let msg = tokio::time::timeout(Duration::from_millis(200), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.channel, "orders.created");
    }
}
