//! # Event Bus System
//!
//! Provides an event-driven architecture for the sync engine using `tokio::sync::broadcast`.
//! UI collaborators (popup, toast notifications, options page) subscribe here instead of
//! being called directly by the engine.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for sync lifecycle and backups
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ SyncCoordinator  ├─────────>│ EventBus  ├────────────>│ Popup / UI │
//! └──────────────────┘          │ (broadcast│             └────────────┘
//! ┌──────────────────┐   emit   │  channel) │  subscribe  ┌────────────┐
//! │  BackupManager   ├─────────>│           ├────────────>│ Notifier   │
//! └──────────────────┘          └───────────┘             └────────────┘
//! ```
//!
//! Delivery order is the emission order for every subscriber. A subscriber
//! that panics or lags never affects the publisher or other subscribers.
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
//!     .emit(CoreEvent::Sync(SyncEvent::Completed {
//!         attempt_id: "a-1".to_string(),
//!         trigger: "manual".to_string(),
//!         words_count: 42,
//!         duration_ms: 120,
//!         notify_user: true,
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Sync completed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishers ignore the "no subscribers" error with `.ok()`; the engine never
//! depends on anyone listening.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync lifecycle events
    Sync(SyncEvent),
    /// Backup, restore and import events
    Backup(BackupEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Backup(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::ConflictPending { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::RetryScheduled { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Backup(BackupEvent::Restored { .. }) => EventSeverity::Info,
            CoreEvent::Backup(BackupEvent::Imported { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Whether a host should surface this event to the user (toast, badge).
    ///
    /// Sync outcomes carry their own flag; periodic successes and periodic
    /// failures that still have retries left stay silent.
    pub fn should_notify(&self) -> bool {
        match self {
            CoreEvent::Sync(SyncEvent::Completed { notify_user, .. })
            | CoreEvent::Sync(SyncEvent::Failed { notify_user, .. }) => *notify_user,
            CoreEvent::Sync(SyncEvent::ConflictPending { .. }) => true,
            CoreEvent::Backup(BackupEvent::Restored { .. })
            | CoreEvent::Backup(BackupEvent::Imported { .. }) => true,
            _ => false,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events describing one sync attempt from start to outcome.
///
/// `trigger` is the wire form of the trigger (`startup`, `manual`,
/// `dataChange`, `auto`, `retry_<n>`). Hosts see `syncComplete` and
/// `syncError` with camelCase fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum SyncEvent {
    /// Sync attempt entered the syncing state.
    #[serde(rename = "syncStarted")]
    Started {
        /// Unique identifier for this attempt.
        attempt_id: String,
        trigger: String,
    },
    /// Merged snapshot persisted locally and uploaded.
    #[serde(rename = "syncComplete")]
    Completed {
        attempt_id: String,
        trigger: String,
        /// Number of words in the merged snapshot.
        words_count: usize,
        duration_ms: u64,
        /// Whether the host should show a success notification.
        notify_user: bool,
    },
    /// Attempt aborted with an error.
    #[serde(rename = "syncError")]
    Failed {
        attempt_id: String,
        trigger: String,
        /// Human-readable error message.
        #[serde(rename = "error", alias = "message")]
        message: String,
        /// Error taxonomy name (e.g. "network", "validation").
        kind: String,
        consecutive_failures: u32,
        /// Whether another attempt will be scheduled automatically.
        will_retry: bool,
        /// Whether the host should show an error notification.
        notify_user: bool,
    },
    /// A retry was scheduled after a failure.
    #[serde(rename = "syncRetryScheduled")]
    RetryScheduled {
        /// Trigger the retry will run with.
        trigger: String,
        delay_ms: u64,
        consecutive_failures: u32,
    },
    /// Snapshots diverged under the `ask` strategy and no decision is available.
    #[serde(rename = "syncConflictPending")]
    ConflictPending {
        attempt_id: String,
        trigger: String,
        local_words: usize,
        remote_words: usize,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Completed { .. } => "Sync completed",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::RetryScheduled { .. } => "Sync retry scheduled",
            SyncEvent::ConflictPending { .. } => "Sync conflict awaiting decision",
        }
    }
}

// ============================================================================
// Backup Events
// ============================================================================

/// Events related to local backups and snapshot import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum BackupEvent {
    /// A pre-merge backup of local data was stored.
    #[serde(rename = "backupCreated")]
    Created {
        backup_id: String,
        reason: String,
        words_count: usize,
    },
    /// Local data was replaced by a stored backup.
    #[serde(rename = "backupRestored")]
    Restored {
        backup_id: String,
        words_count: usize,
    },
    /// An exported snapshot was merged into local data.
    #[serde(rename = "snapshotImported")]
    Imported { words_count: usize },
}

impl BackupEvent {
    fn description(&self) -> &str {
        match self {
            BackupEvent::Created { .. } => "Backup created",
            BackupEvent::Restored { .. } => "Backup restored",
            BackupEvent::Imported { .. } => "Snapshot imported",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to engine events.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
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

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let notifications = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.should_notify());
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
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
