//! # Local Backups
//!
//! Keeps the last few pre-merge local snapshots under the `syncBackups` key so
//! a bad merge can be rolled back. Entries are stored oldest first and pruned
//! from the front once `max_versions` is exceeded; `max_versions == 0`
//! disables backups entirely.

use crate::model::SyncSnapshot;
use crate::{Result, SyncError};
use bridge_traits::storage::{LocalStore, StoreEntries};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const BACKUPS_KEY: &str = "syncBackups";

/// Why a backup was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackupReason {
    /// Before a sync overwrote local data with a merge result
    PreMerge,
    /// Before a backup restore replaced local data
    PreRestore,
    /// Before an imported snapshot was merged in
    PreImport,
}

impl BackupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupReason::PreMerge => "preMerge",
            BackupReason::PreRestore => "preRestore",
            BackupReason::PreImport => "preImport",
        }
    }
}

/// A stored backup including its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub reason: BackupReason,
    pub words_count: usize,
    pub snapshot: SyncSnapshot,
}

/// Listing view of a backup without its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub reason: BackupReason,
    pub words_count: usize,
}

impl From<&BackupEntry> for BackupInfo {
    fn from(entry: &BackupEntry) -> Self {
        Self {
            id: entry.id.clone(),
            created_at: entry.created_at,
            reason: entry.reason,
            words_count: entry.words_count,
        }
    }
}

pub struct BackupManager {
    store: Arc<dyn LocalStore>,
    max_versions: usize,
}

impl BackupManager {
    pub fn new(store: Arc<dyn LocalStore>, max_versions: usize) -> Self {
        Self {
            store,
            max_versions,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_versions > 0
    }

    /// Store `snapshot` as the newest backup.
    ///
    /// Returns `None` without touching the store when backups are disabled.
    pub async fn create(
        &self,
        snapshot: &SyncSnapshot,
        reason: BackupReason,
        now: DateTime<Utc>,
    ) -> Result<Option<BackupInfo>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let entry = BackupEntry {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            reason,
            words_count: snapshot.words_count(),
            snapshot: snapshot.clone(),
        };
        let info = BackupInfo::from(&entry);

        let mut entries = self.load().await?;
        entries.push(entry);
        if entries.len() > self.max_versions {
            let excess = entries.len() - self.max_versions;
            entries.drain(..excess);
            debug!(pruned = excess, "Pruned old backups");
        }
        self.save(&entries).await?;

        info!(backup_id = %info.id, reason = reason.as_str(), words = info.words_count, "Created backup");
        Ok(Some(info))
    }

    /// Backups, newest first.
    pub async fn list(&self) -> Result<Vec<BackupInfo>> {
        Ok(self.load().await?.iter().rev().map(BackupInfo::from).collect())
    }

    pub async fn get(&self, backup_id: &str) -> Result<BackupEntry> {
        self.load()
            .await?
            .into_iter()
            .find(|entry| entry.id == backup_id)
            .ok_or_else(|| SyncError::BackupNotFound {
                backup_id: backup_id.to_string(),
            })
    }

    async fn load(&self) -> Result<Vec<BackupEntry>> {
        let mut entries = self
            .store
            .get(&[BACKUPS_KEY])
            .await
            .map_err(SyncError::local)?;

        match entries.remove(BACKUPS_KEY).filter(|v| !v.is_null()) {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| SyncError::Validation(format!("Stored backups are malformed: {}", e))),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, backups: &[BackupEntry]) -> Result<()> {
        let mut entries = StoreEntries::new();
        entries.insert(BACKUPS_KEY.to_string(), serde_json::to_value(backups)?);
        self.store.set(entries).await.map_err(SyncError::local)
    }
}
