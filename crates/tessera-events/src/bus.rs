use tokio::sync::broadcast;

use crate::Event;

/// Unified event bus for the engine.
///
/// Every component receives a cloned `EventBus` and publishes directly;
/// subscribers see all events from all components in publish order.
///
/// `publish()` is a sync call, safe from both async tasks and blocking
/// threads. With no subscribers, events are silently dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to all subscribers. Accepts any sub-enum value directly:
    /// `bus.publish(PlayerEvent::ManifestChange { is_live: false })`.
    pub fn publish<E: Into<Event>>(&self, event: E) {
        let _ = self.tx.send(event.into());
    }

    /// Subscribe to all future events. Each subscriber gets an independent
    /// receiver; slow subscribers observe `RecvError::Lagged` instead of
    /// blocking producers.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
