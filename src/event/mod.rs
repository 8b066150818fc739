//! Event system for the presentation layer.
//!
//! The driver task publishes connection changes, readings, gas status
//! messages and raw traffic lines. Any number of subscribers may listen.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::types::{Connection, Reading, ReadingKind};

/// Direction of a raw protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent to the device.
    Sent,
    /// Received from the device.
    Received,
}

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Connection established or lost.
    ConnectionChanged(Connection),
    /// A reading was decoded and accepted.
    ReadingUpdated(Reading),
    /// Gas status message received.
    StatusMessage { gas_alarm: bool },
    /// Raw protocol text.
    RawLog { text: String, direction: Direction },
}

/// Coarse event categories used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connection,
    Reading,
    Status,
    RawLog,
}

impl Event {
    /// Returns the category of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ConnectionChanged(_) => EventKind::Connection,
            Self::ReadingUpdated(_) => EventKind::Reading,
            Self::StatusMessage { .. } => EventKind::Status,
            Self::RawLog { .. } => EventKind::RawLog,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed by a lagging
    /// subscriber are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription filter for specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by event category.
    pub kinds: Option<Vec<EventKind>>,
    /// Filter by reading kind (only applies to reading events).
    pub reading: Option<ReadingKind>,
}

impl EventFilter {
    /// Creates a filter for specific event categories.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds: Some(kinds),
            reading: None,
        }
    }

    /// Creates a filter for updates of one reading.
    #[must_use]
    pub fn reading(kind: ReadingKind) -> Self {
        Self {
            kinds: Some(vec![EventKind::Reading]),
            reading: Some(kind),
        }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self
            .kinds
            .as_ref()
            .is_some_and(|kinds| !kinds.contains(&event.kind()))
        {
            return false;
        }

        match (self.reading, event) {
            (None, _) => true,
            (Some(expected), Event::ReadingUpdated(reading)) => reading.kind() == expected,
            (Some(_), _) => false,
        }
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        tracing::trace!("dispatching {:?}", event);
        // No receivers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Only events dispatched after this call are considered. Returns `None`
    /// if the timeout expires or the dispatcher is gone.
    pub async fn wait_for(
        &self,
        filter: EventFilter,
        timeout: std::time::Duration,
    ) -> Option<Event> {
        let mut subscription = self.subscribe();

        tokio::select! {
            biased;
            result = async {
                loop {
                    if let Some(event) = subscription.recv().await {
                        if filter.matches(&event) {
                            return Some(event);
                        }
                    } else {
                        return None;
                    }
                }
            } => result,
            () = tokio::time::sleep(timeout) => None,
        }
    }
}
