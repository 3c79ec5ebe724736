//! Workspace facade crate.
//!
//! Re-exports the sync engine and its runtime so host applications can depend
//! on `vocab-sync-workspace` alone. The `desktop-shims` feature (default) also
//! exposes the desktop bridge adapters and lets `CoreConfig` fall back to them
//! when a host does not inject its own local store or scheduler.

pub use bridge_traits;
pub use core_runtime;
pub use core_sync;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
