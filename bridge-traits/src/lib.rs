//! # Host Bridge Traits
//!
//! Capability traits the sync engine needs from its host.
//!
//! ## Overview
//!
//! The engine never touches storage, the network, or timers directly. Each
//! collaborator is injected behind one of these traits so that the same core
//! runs inside a desktop app, a browser extension background worker, or a
//! test harness.
//!
//! ## Traits
//!
//! ### Storage
//! - [`LocalStore`](storage::LocalStore) - Device-local key/value collections
//! - [`RemoteStore`](storage::RemoteStore) - Per-user remote payload storage
//!
//! ### Identity
//! - [`AuthProvider`](auth::AuthProvider) - Current user identity, if any
//!
//! ### Scheduling & Time
//! - [`TaskScheduler`](background::TaskScheduler) - Delayed and repeating tasks
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Host
//! implementations convert their platform errors into it; the core maps them
//! onto its own sync error taxonomy.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so implementations can be shared across
//! async tasks behind `Arc`.

pub mod auth;
pub mod background;
pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use auth::{AuthProvider, Identity};
pub use background::{TaskFactory, TaskFuture, TaskHandle, TaskId, TaskScheduler};
pub use storage::{LocalStore, RemotePayload, RemoteStore, StoreEntries, UploadAck};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
