//! Event bus: broadcast-only pub/sub for [`ConsensusEvent`]s so transports
//! can stream a Thread's progress to clients.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::ConsensusEvent;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("failed to send event: {0}")]
    SendFailed(String),
}

pub type EventBusResult<T> = Result<T, EventBusError>;

pub type SharedEventBus = Arc<EventBus>;

/// Broadcast bus for [`ConsensusEvent`]s. Unlike the persisted history a
/// Thread accumulates in the store, this bus is fire-and-forget: publishing
/// with zero subscribers is not an error.
pub struct EventBus {
    sender: broadcast::Sender<ConsensusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    pub fn publish(&self, event: ConsensusEvent) -> EventBusResult<()> {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, receivers = count, "event published");
                Ok(())
            }
            Err(_) => {
                debug!(event_type, "event published (no subscribers)");
                Ok(())
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsensusEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Selective subscription by Thread id, since events are ordered per Thread.
pub struct EventFilter {
    pub thread_id: Option<String>,
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self {
            thread_id: None,
            event_types: None,
        }
    }

    pub fn thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn types(mut self, event_types: Vec<&str>) -> Self {
        self.event_types = Some(event_types.into_iter().map(String::from).collect());
        self
    }

    pub fn matches(&self, event: &ConsensusEvent) -> bool {
        if let Some(ref tid) = self.thread_id {
            if event.thread_id() != tid {
                return false;
            }
        }
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }
        true
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FilteredReceiver {
    receiver: broadcast::Receiver<ConsensusEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<ConsensusEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    pub async fn recv(&mut self) -> Result<ConsensusEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

pub trait EventBusExt {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver;
}

impl EventBusExt for EventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

impl EventBusExt for SharedEventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn thread_started(thread_id: &str) -> ConsensusEvent {
        ConsensusEvent::ThreadStarted {
            thread_id: thread_id.to_string(),
            question: "q".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(thread_started("t1")).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "thread_started");
    }

    #[tokio::test]
    async fn publishing_with_no_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        assert!(bus.publish(thread_started("t1")).is_ok());
    }

    #[tokio::test]
    async fn filtered_receiver_only_yields_matching_thread() {
        let bus = EventBus::new().shared();
        let mut filtered = bus.subscribe_filtered(EventFilter::new().thread("target"));

        let bus_clone = bus.clone();
        tokio::spawn(async move {
            bus_clone.publish(thread_started("other")).unwrap();
            bus_clone.publish(thread_started("target")).unwrap();
        });

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.thread_id(), "target");
    }
}
