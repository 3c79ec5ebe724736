//! User decisions for the `ask` conflict strategy.

use crate::model::SyncSnapshot;
use async_trait::async_trait;
use core_runtime::config::ConflictStrategy;
use serde::{Deserialize, Serialize};

/// Answer to a pending conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    KeepLocal,
    KeepRemote,
    Merge,
    /// No answer yet; the conflict stays pending
    Defer,
}

impl ConflictResolution {
    /// Strategy to re-run the merge with, or `None` for [`Defer`](Self::Defer).
    pub fn strategy(&self) -> Option<ConflictStrategy> {
        match self {
            ConflictResolution::KeepLocal => Some(ConflictStrategy::Local),
            ConflictResolution::KeepRemote => Some(ConflictStrategy::Remote),
            ConflictResolution::Merge => Some(ConflictStrategy::Merge),
            ConflictResolution::Defer => None,
        }
    }
}

/// Host callback consulted when the `ask` strategy meets diverged snapshots.
///
/// Only invoked when both sides hold data; the identity cases never ask.
#[async_trait]
pub trait ConflictDecider: Send + Sync {
    async fn decide(&self, local: &SyncSnapshot, remote: &SyncSnapshot) -> ConflictResolution;
}
