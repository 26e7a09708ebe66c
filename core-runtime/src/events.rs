//! # Event Bus System
//!
//! Typed events broadcast over `tokio::sync::broadcast` so a UI or a daemon
//! can follow a sync without being wired into the coordinator.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::Started {
//!     sync_id: "3f1c".to_string(),
//!     accounts: 2,
//! }))
//! .ok();
//!
//! assert!(matches!(subscriber.recv().await, Ok(CoreEvent::Sync(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.
//!
//! Emitting with no subscriber returns an error that publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Link(LinkEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Link(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Link(LinkEvent::MarkedMissing { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Lifecycle of one sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        sync_id: String,
        /// Number of configured accounts.
        accounts: usize,
    },
    /// One link-and-reconcile pass finished.
    PassCompleted {
        sync_id: String,
        /// 1-based pass number.
        pass: u32,
        /// Remote and local mutations applied by this pass.
        changes: u64,
    },
    Completed {
        sync_id: String,
        passes: u32,
        liked: u64,
        unliked: u64,
        pulled: u64,
        still_missing: u64,
        duration_ms: u64,
    },
    Failed {
        sync_id: String,
        message: String,
        /// Compensating actions that were executed.
        recovered: u64,
    },
    Cancelled {
        sync_id: String,
        timed_out: bool,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::PassCompleted { .. } => "Sync pass completed",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }
}

// ============================================================================
// Link Events
// ============================================================================

/// Changes to the cross-service identity mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LinkEvent {
    EntityCreated {
        entity_id: String,
        kind: String,
    },
    /// A stored remote id was overwritten by a fresher match.
    Relinked {
        entity_id: String,
        service: String,
        previous: Option<String>,
        current: String,
    },
    MarkedMissing {
        entity_id: String,
        service: String,
    },
    /// A link previously marked missing resolved to a concrete id.
    Found {
        entity_id: String,
        service: String,
        remote_id: String,
    },
}

impl LinkEvent {
    fn description(&self) -> &str {
        match self {
            LinkEvent::EntityCreated { .. } => "Entity created",
            LinkEvent::Relinked { .. } => "Entity relinked",
            LinkEvent::MarkedMissing { .. } => "Entity missing on service",
            LinkEvent::Found { .. } => "Missing entity found",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by every publisher.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Events buffered per subscriber before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New receiver for all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` that skips events not matching a predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Started {
            sync_id: "s1".to_string(),
            accounts: 2,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started()).is_err());
    }

    #[tokio::test]
    async fn test_event_emission_with_subscribers() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        assert_eq!(bus.emit(started()).unwrap(), 1);
        assert_eq!(sub.recv().await.unwrap(), started());
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Link(_)));

        bus.emit(started()).unwrap();
        let link = CoreEvent::Link(LinkEvent::MarkedMissing {
            entity_id: "e1".to_string(),
            service: "tidal".to_string(),
        });
        bus.emit(link.clone()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), link);
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            sync_id: "s1".to_string(),
            message: "boom".to_string(),
            recovered: 0,
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(started().severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Link(LinkEvent::Found {
            entity_id: "e1".to_string(),
            service: "deezer".to_string(),
            remote_id: "42".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Link\""));
        assert!(json.contains("\"event\":\"Found\""));
        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
