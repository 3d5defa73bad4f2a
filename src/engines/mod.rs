//! Pattern engines: one module per enterprise messaging pattern, each built
//! on top of [`crate::store::ScriptLibrary`] and sharing [`crate::event_bus::EventBus`]
//! for observability.

pub mod content_router;
pub mod dlq;
pub mod error;
pub mod fan_out;
pub mod monitor;
pub mod pubsub;
pub mod request_reply;
pub mod scheduler;
pub mod topic_routing;
pub mod work_queue;

pub use content_router::{ContentRouterEngine, PaymentSubmission, RoutingDecision};
pub use dlq::{DlqConfig, DlqEngine, ProcessResult};
pub use error::EngineError;
pub use fan_out::{FanOutConfig, FanOutEngine};
pub use monitor::StreamMonitor;
pub use pubsub::PubSubEngine;
pub use request_reply::RequestReplyEngine;
pub use scheduler::SchedulerEngine;
pub use topic_routing::TopicRoutingEngine;
pub use work_queue::{WorkQueueConfig, WorkQueueEngine};
