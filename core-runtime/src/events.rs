//! # Event Bus System
//!
//! Broadcasts typed progress events from the sync pipeline to any number of
//! observers (the CLI progress printer, tests) using `tokio::sync::broadcast`.
//!
//! ```text
//! ┌─────────────────┐   emit    ┌───────────┐  subscribe  ┌────────────┐
//! │ SyncCoordinator ├──────────>│ EventBus  ├────────────>│ Subscriber │
//! └─────────────────┘           └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Started {
//!         job_id: "job-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Sync started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Progress events are advisory, so subscribers should keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped.
//!
//! Emitting with no subscribers returns an error that publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Reconciliation pass events
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Warning { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Started { .. }) => EventSeverity::Info,
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

/// Events emitted during one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Pass initiated.
    Started { job_id: String },
    /// The pass moved to a new phase (e.g. `fetching_remote`).
    PhaseChanged { job_id: String, phase: String },
    /// Incremental progress within a phase.
    Progress {
        job_id: String,
        phase: String,
        items_processed: u64,
        /// Known only while fetching remote collections.
        total_items: Option<u64>,
    },
    /// A degraded-but-continuing condition, such as a remote outage.
    Warning { job_id: String, message: String },
    /// Pass finished and both inventories were persisted.
    Completed {
        job_id: String,
        remote_files: u64,
        local_files: u64,
        collection_errors: u64,
        duration_ms: u64,
    },
    /// Pass stopped on a fatal error.
    Failed { job_id: String, message: String },
    /// Pass was cancelled before completion.
    Cancelled { job_id: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::PhaseChanged { .. } => "Sync phase changed",
            SyncEvent::Progress { .. } => "Sync in progress",
            SyncEvent::Warning { .. } => "Sync warning",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }

    /// Identifier of the pass that produced this event.
    pub fn job_id(&self) -> &str {
        match self {
            SyncEvent::Started { job_id }
            | SyncEvent::PhaseChanged { job_id, .. }
            | SyncEvent::Progress { job_id, .. }
            | SyncEvent::Warning { job_id, .. }
            | SyncEvent::Completed { job_id, .. }
            | SyncEvent::Failed { job_id, .. }
            | SyncEvent::Cancelled { job_id } => job_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel.
///
/// Cloning an `EventBus` yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
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

/// A `broadcast::Receiver` with an optional predicate.
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

    /// Only events matching `predicate` are returned by `recv()`.
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

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(job_id: &str, n: u64) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Progress {
            job_id: job_id.to_string(),
            phase: "scanning_local".to_string(),
            items_processed: n,
            total_items: None,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(progress("job", 1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let event = CoreEvent::Sync(SyncEvent::Started {
            job_id: "job-1".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| event.severity() >= EventSeverity::Info);

        bus.emit(progress("job", 1)).unwrap();
        bus.emit(CoreEvent::Sync(SyncEvent::Warning {
            job_id: "job".to_string(),
            message: "remote unavailable".to_string(),
        }))
        .unwrap();

        let received = stream.recv().await.unwrap();
        assert_eq!(received.severity(), EventSeverity::Warning);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut subscriber = bus.subscribe();

        for i in 0..5 {
            bus.emit(progress("job", i)).unwrap();
        }

        assert!(matches!(
            subscriber.recv().await,
            Err(RecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_event_severity_and_description() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            job_id: "job".to_string(),
            message: "scan failed".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(failed.description(), "Sync failed");
        assert_eq!(progress("job", 3).severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::Completed {
            job_id: "job-9".to_string(),
            remote_files: 4,
            local_files: 2,
            collection_errors: 1,
            duration_ms: 1500,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Sync");
        assert_eq!(json["payload"]["event"], "Completed");
        assert_eq!(json["payload"]["local_files"], 2);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_job_id_accessor() {
        let event = SyncEvent::Cancelled {
            job_id: "abc".to_string(),
        };
        assert_eq!(event.job_id(), "abc");
    }
}
