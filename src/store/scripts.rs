//! The four atomic server-side procedures (§4.2).
//!
//! All four are required, backend-specific `ScriptLibrary` methods, each
//! running as a single indivisible unit: a held write lock for the whole
//! operation on [`crate::store::memory::MemoryStore`], a registered Lua
//! script invoked with `EVAL`/`EVALSHA` on [`crate::store::redis::RedisStore`].
//! Neither backend composes one of these from a sequence of independent
//! [`StoreBackend`] calls; §5's atomicity rule ("route to N destinations
//! ... MUST be performed inside a server-side script or store transaction")
//! applies to all of `route_message`, `request`, and `response`, not just
//! `read_claim_or_dlq`.
//!
//! Routing-rule matching itself (regex, enabled/priority/stop-on-match) is
//! evaluated in Rust via [`matching_rules`] per §4.2.2's note that the host
//! pattern language is generalized to the `regex` crate. Only the resulting
//! writes (the exchange append plus one append per matched destination)
//! need the store's atomicity guarantee, so both backends compute the match
//! set first and hand it to their atomic write path.

use async_trait::async_trait;
use regex::Regex;

use super::backend::StoreBackend;
use super::error::StoreError;
use super::model::{ClaimOrDlqResult, Fields, RouteResult, RoutingRule};

pub fn routing_rules_key(exchange: &str) -> String {
    format!("routing:rules:{exchange}")
}

/// Rules from a `routing:rules:<exchange>` hash that fire for `routing_key`,
/// already filtered to enabled rules, sorted `(priority asc, id asc)`, and
/// truncated at the first `stop_on_match` hit: exactly the rules the atomic
/// write path must append to, in order.
pub fn matching_rules(rules_raw: &Fields, routing_key: &str) -> Vec<RoutingRule> {
    let mut rules: Vec<RoutingRule> = rules_raw
        .values()
        .filter_map(|json| serde_json::from_str::<RoutingRule>(json).ok())
        .filter(|r| r.enabled)
        .collect();
    rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

    let mut matched = Vec::new();
    for rule in rules {
        let Ok(regex) = Regex::new(&rule.pattern) else {
            continue;
        };
        if !regex.is_match(routing_key) {
            continue;
        }
        let stop = rule.stop_on_match;
        matched.push(rule);
        if stop {
            break;
        }
    }
    matched
}

#[async_trait]
pub trait ScriptLibrary: StoreBackend {
    /// §4.2.1 — claim idle pending entries, route exhausted ones to the DLQ,
    /// and deliver new entries, all as one indivisible unit.
    async fn read_claim_or_dlq(
        &self,
        main_log: &str,
        dlq_log: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
        max_deliveries: u64,
    ) -> Result<ClaimOrDlqResult, StoreError>;

    /// §4.2.2 — append to the exchange, then fan out to every matching,
    /// enabled rule in `(priority asc, id asc)` order, honoring
    /// `stop_on_match`, as one atomic unit: all appends succeed or none.
    async fn route_message(
        &self,
        exchange_log: &str,
        routing_key: &str,
        payload: Fields,
    ) -> Result<RouteResult, StoreError>;

    /// §4.2.3 — open a correlation: timeout key + shadow key + the request
    /// itself, as one atomic unit.
    async fn request(
        &self,
        corr_id: &str,
        business_id: &str,
        response_log: &str,
        timeout_sec: u64,
        request_log: &str,
        payload: Fields,
    ) -> Result<String, StoreError>;

    /// §4.2.4 — close a correlation: delete the timeout key (racing the
    /// expiration listener), then publish the response, as one atomic unit.
    async fn response(
        &self,
        corr_id: &str,
        business_id: &str,
        response_log: &str,
        payload: Fields,
    ) -> Result<String, StoreError>;
}

pub fn timeout_key(corr_id: &str) -> String {
    format!("req.timeout:{corr_id}")
}

pub fn shadow_key(corr_id: &str) -> String {
    format!("req.timeout.shadow:{corr_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn route_message_stop_on_match_halts_evaluation() {
        let store = MemoryStore::new();
        let rules = vec![
            RoutingRule {
                id: "R10".into(),
                pattern: r"^order\.".into(),
                destination: "events.order.v1".into(),
                description: String::new(),
                priority: 100,
                enabled: true,
                stop_on_match: false,
            },
            RoutingRule {
                id: "R20".into(),
                pattern: r"\.vip".into(),
                destination: "events.notification.vip".into(),
                description: String::new(),
                priority: 100,
                enabled: true,
                stop_on_match: false,
            },
            RoutingRule {
                id: "R99".into(),
                pattern: r"^order\.cancelled".into(),
                destination: "events.audit.cancelled".into(),
                description: String::new(),
                priority: 10,
                enabled: true,
                stop_on_match: true,
            },
        ];
        for rule in &rules {
            store
                .hset(
                    "routing:rules:events.topic.v1",
                    &rule.id,
                    &serde_json::to_string(rule).unwrap(),
                )
                .await
                .unwrap();
        }

        let mut payload = Fields::new();
        payload.insert("orderId".into(), "9000".into());
        let result = store
            .route_message("events.topic.v1", "order.cancelled.vip.eu.v1", payload)
            .await
            .unwrap();

        assert_eq!(result.routed_to.len(), 1);
        assert_eq!(result.routed_to[0].log, "events.audit.cancelled");
    }

    #[tokio::test]
    async fn response_deletes_timeout_key_before_publishing() {
        let store = MemoryStore::new();
        store
            .request("corr-1", "biz-1", "resp.log", 5, "req.log", Fields::new())
            .await
            .unwrap();
        assert!(store.kv_get(&timeout_key("corr-1")).await.unwrap().is_some());

        store
            .response("corr-1", "biz-1", "resp.log", Fields::new())
            .await
            .unwrap();
        assert!(store.kv_get(&timeout_key("corr-1")).await.unwrap().is_none());

        let entries = store.range("resp.log", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field("correlationId"), Some("corr-1"));
    }
}
