//! # Sync State Machine
//!
//! ```text
//! Idle → Syncing → Succeeded ─┐
//!           │  └──→ Failed ───┤
//!           └─────────────────┴──→ Idle
//! ```
//!
//! A scheduled retry re-enters through `Idle → Syncing` like any other attempt.
//!
//! At most one attempt holds the `Syncing` state. [`SyncStateCell::try_begin`]
//! hands out a [`SyncGuard`] that returns the cell to `Idle` when dropped, so
//! every exit path of an attempt (including `?` and panics) releases it.

use crate::{Result, SyncError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Succeeded,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Succeeded => "succeeded",
            SyncState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Succeeded | SyncState::Failed)
    }

    fn validate_transition(&self, to: SyncState) -> Result<()> {
        let valid = match (self, to) {
            (SyncState::Idle, SyncState::Syncing) => true,

            (SyncState::Syncing, SyncState::Succeeded) => true,
            (SyncState::Syncing, SyncState::Failed) => true,
            // Attempt stopped without an outcome (pending conflict)
            (SyncState::Syncing, SyncState::Idle) => true,

            (SyncState::Succeeded, SyncState::Idle) => true,
            (SyncState::Failed, SyncState::Idle) => true,

            _ => false,
        };

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        Ok(())
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared single-flight flag.
#[derive(Debug, Clone)]
pub struct SyncStateCell {
    state: Arc<Mutex<SyncState>>,
}

impl Default for SyncStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateCell {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SyncState::Idle)),
        }
    }

    pub fn current(&self) -> SyncState {
        *self.state.lock()
    }

    /// Enter `Syncing`, or `None` if another attempt holds it.
    pub fn try_begin(&self) -> Option<SyncGuard> {
        let mut state = self.state.lock();
        if state.validate_transition(SyncState::Syncing).is_err() {
            return None;
        }
        *state = SyncState::Syncing;
        Some(SyncGuard {
            state: Arc::clone(&self.state),
        })
    }
}

/// Proof of holding the `Syncing` state.
#[must_use = "dropping the guard releases the sync slot"]
pub struct SyncGuard {
    state: Arc<Mutex<SyncState>>,
}

impl SyncGuard {
    /// Record the attempt's terminal state. The slot stays held until drop.
    pub fn finish(&self, outcome: SyncState) -> Result<()> {
        let mut state = self.state.lock();
        state.validate_transition(outcome)?;
        *state = outcome;
        Ok(())
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        *self.state.lock() = SyncState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let cell = SyncStateCell::new();
        let guard = cell.try_begin().unwrap();
        assert_eq!(cell.current(), SyncState::Syncing);
        assert!(cell.try_begin().is_none());

        drop(guard);
        assert_eq!(cell.current(), SyncState::Idle);
        assert!(cell.try_begin().is_some());
    }

    #[test]
    fn test_finish_then_release() {
        let cell = SyncStateCell::new();
        let guard = cell.try_begin().unwrap();
        guard.finish(SyncState::Failed).unwrap();
        assert_eq!(cell.current(), SyncState::Failed);
        assert!(cell.clone().try_begin().is_none());

        drop(guard);
        assert_eq!(cell.current(), SyncState::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(SyncState::Idle.validate_transition(SyncState::Succeeded).is_err());
        assert!(SyncState::Succeeded.validate_transition(SyncState::Failed).is_err());
        assert!(SyncState::Syncing.validate_transition(SyncState::Syncing).is_err());

        let cell = SyncStateCell::new();
        let guard = cell.try_begin().unwrap();
        guard.finish(SyncState::Succeeded).unwrap();
        assert!(matches!(
            guard.finish(SyncState::Failed),
            Err(SyncError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_guard_released_on_panic() {
        let cell = SyncStateCell::new();
        let inner = cell.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = inner.try_begin().unwrap();
            panic!("attempt blew up");
        }));

        assert!(result.is_err());
        assert_eq!(cell.current(), SyncState::Idle);
    }
}
