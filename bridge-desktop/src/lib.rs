//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `LocalStore` as a single JSON file in the app data directory
//! - `RemoteStore` as one directory per user (local stand-in for a cloud store)
//! - `AuthProvider` holding the identity set by the host shell
//! - `TaskScheduler` using Tokio timers
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{JsonFileStore, TokioTaskScheduler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = JsonFileStore::in_data_dir();
//!     let scheduler = TokioTaskScheduler::current().unwrap();
//!
//!     // Use in core configuration
//! }
//! ```

mod auth;
mod background;
mod remote;
mod store;

pub use auth::StaticAuthProvider;
pub use background::TokioTaskScheduler;
pub use remote::DirectoryRemoteStore;
pub use store::JsonFileStore;
