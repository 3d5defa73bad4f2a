//! In-process event broadcaster (C12). Every pattern engine publishes here;
//! the stream monitor and the `/ws/dlq-events` handler subscribe.

use tokio::sync::broadcast;

use crate::store::{BusEvent, Entry};

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Drop-oldest on overflow is `broadcast`'s native behavior; a lagged
    /// receiver just observes `RecvError::Lagged(n)` on its next recv.
    pub fn publish(&self, event: BusEvent) {
        let _ = self.tx.send(event);
    }

    pub fn produced(&self, stream_name: &str, entry: &Entry) {
        self.publish(BusEvent::produced(stream_name, entry));
    }

    pub fn info(&self, details: impl Into<String>) {
        self.publish(BusEvent::info(details));
    }

    pub fn error(&self, details: impl Into<String>) {
        self.publish(BusEvent::error(details));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Fields;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        bus.info("hello");

        let event = sub.recv().await.unwrap();
        assert_eq!(event.details.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn lagging_subscriber_observes_lagged_not_a_panic() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for i in 0..5 {
            bus.info(format!("msg-{i}"));
        }
        let result = sub.recv().await;
        assert!(matches!(result, Err(broadcast::error::RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn produced_carries_entry_fields() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        let mut fields = Fields::new();
        fields.insert("k".into(), "v".into());
        let entry = Entry::new("1-1", fields);
        bus.produced("L", &entry);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.message_id.as_deref(), Some("1-1"));
    }
}
