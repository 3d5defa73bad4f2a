//! Core value types shared by every pattern engine.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered set of string fields carried by a single log record.
pub type Fields = IndexMap<String, String>;

/// A single record appended to a log. Ids are assigned by the store and are
/// monotonically increasing within a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub fields: Fields,
}

impl Entry {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// A pending-entries-list row: an entry delivered to a group but not yet acked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub id: String,
    pub consumer: String,
    pub idle_ms: u64,
    pub delivery_count: u64,
}

/// A message handed back to engine callers, carrying enough context for
/// retry/DLQ bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub fields: Fields,
    pub delivery_count: u64,
    pub is_retry: bool,
    pub log: String,
    pub group: String,
    pub consumer: String,
}

/// Outcome of `read_claim_or_dlq`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOrDlqResult {
    pub ready_entries: Vec<Entry>,
    pub dlq_routings: Vec<DlqRouting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqRouting {
    pub orig_id: String,
    pub new_dlq_id: String,
}

/// A dynamic topic-routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    pub id: String,
    pub pattern: String,
    pub destination: String,
    #[serde(default)]
    pub description: String,
    pub priority: i32,
    pub enabled: bool,
    pub stop_on_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingMetadata {
    pub max_rules: u32,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub description: String,
}

impl Default for RoutingMetadata {
    fn default() -> Self {
        Self {
            max_rules: 100,
            version: 1,
            updated_at: Utc::now(),
            description: String::new(),
        }
    }
}

/// Outcome of a single `route_message` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub exchange_id: String,
    pub routed_to: Vec<RoutedDestination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedDestination {
    pub log: String,
    pub id: String,
}

/// A delayed message awaiting its scheduled time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub scheduled_for_epoch_millis: i64,
    pub created_at_epoch_millis: i64,
}

/// A live-telemetry event emitted onto the event bus (§4.12's wire schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEvent {
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BusEvent {
    pub fn info(details: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Info,
            message_id: None,
            payload: None,
            stream_name: None,
            consumer: None,
            details: Some(details.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn error(details: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Error,
            message_id: None,
            payload: None,
            stream_name: None,
            consumer: None,
            details: Some(details.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn produced(stream_name: impl Into<String>, entry: &Entry) -> Self {
        Self {
            event_type: EventType::MessageProduced,
            message_id: Some(entry.id.clone()),
            payload: Some(entry.fields.clone()),
            stream_name: Some(stream_name.into()),
            consumer: None,
            details: None,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    MessageProduced,
    MessageDeleted,
    MessageProcessed,
    MessageReclaimed,
    MessageToDlq,
    Info,
    Error,
}
