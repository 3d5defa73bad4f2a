//! Store adapter: a Redis-style log/KV primitive behind one trait, with a
//! zero-dependency in-memory implementation and a real Redis implementation.

pub mod backend;
pub mod error;
pub mod memory;
pub mod model;
pub mod redis;
pub mod scripts;

pub use backend::{ChannelMessage, StoreBackend};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{
    BusEvent, ClaimOrDlqResult, DlqRouting, Entry, EventType, Fields, Message, PendingEntry,
    RouteResult, RoutedDestination, RoutingMetadata, RoutingRule, ScheduledItem,
};
pub use redis::RedisStore;
pub use scripts::ScriptLibrary;
