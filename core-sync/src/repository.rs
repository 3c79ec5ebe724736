//! # Snapshot Repository
//!
//! Maps the engine's typed state onto the host's key/value [`LocalStore`].
//!
//! ## Layout
//!
//! | key             | value                                 |
//! |-----------------|---------------------------------------|
//! | `words`         | array of vocabulary records           |
//! | `analytics`     | analytics snapshot                    |
//! | `gamification`  | gamification state                    |
//! | `deviceId`      | uuid v4 string, created on first use  |
//! | `syncMetadata`  | [`SyncMetadata`]                      |
//!
//! A missing `words` key is a fresh install, not an error.

use crate::metadata::SyncMetadata;
use crate::model::SyncSnapshot;
use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::storage::{LocalStore, StoreEntries};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const WORDS_KEY: &str = "words";
pub const ANALYTICS_KEY: &str = "analytics";
pub const GAMIFICATION_KEY: &str = "gamification";
pub const DEVICE_ID_KEY: &str = "deviceId";
pub const METADATA_KEY: &str = "syncMetadata";

// ============================================================================
// Repository Trait
// ============================================================================

/// Persistence for the local snapshot and sync metadata
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Read the local dataset, stamped with `now`.
    ///
    /// # Errors
    ///
    /// [`SyncError::LocalStore`] if the store fails, [`SyncError::Validation`]
    /// if stored data does not parse.
    async fn load_snapshot(&self, now: DateTime<Utc>) -> Result<SyncSnapshot>;

    /// Overwrite words, analytics and gamification with `snapshot`.
    async fn save_snapshot(&self, snapshot: &SyncSnapshot) -> Result<()>;

    /// Stable identifier of this device, created on first call.
    async fn device_id(&self) -> Result<String>;

    async fn load_metadata(&self) -> Result<Option<SyncMetadata>>;

    async fn save_metadata(&self, metadata: &SyncMetadata) -> Result<()>;

    async fn clear_metadata(&self) -> Result<()>;
}

// ============================================================================
// LocalStore Implementation
// ============================================================================

/// [`SnapshotRepository`] backed by a [`LocalStore`]
pub struct LocalSnapshotRepository {
    store: Arc<dyn LocalStore>,
}

impl LocalSnapshotRepository {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotRepository for LocalSnapshotRepository {
    async fn load_snapshot(&self, now: DateTime<Utc>) -> Result<SyncSnapshot> {
        let device_id = self.device_id().await?;
        let mut entries = self
            .store
            .get(&[WORDS_KEY, ANALYTICS_KEY, GAMIFICATION_KEY])
            .await
            .map_err(SyncError::local)?;

        let mut object = Map::new();
        object.insert("timestamp".to_string(), serde_json::to_value(now)?);
        object.insert("deviceId".to_string(), Value::String(device_id));
        object.insert(
            WORDS_KEY.to_string(),
            entries
                .remove(WORDS_KEY)
                .filter(|v| !v.is_null())
                .unwrap_or_else(|| Value::Array(Vec::new())),
        );
        for key in [ANALYTICS_KEY, GAMIFICATION_KEY] {
            if let Some(value) = entries.remove(key).filter(|v| !v.is_null()) {
                object.insert(key.to_string(), value);
            }
        }

        let snapshot = SyncSnapshot::validate_json(Value::Object(object))
            .map_err(|e| match e {
                SyncError::Validation(msg) => {
                    SyncError::Validation(format!("Local data is malformed: {}", msg))
                }
                other => other,
            })?;

        debug!(words = snapshot.words_count(), "Loaded local snapshot");
        Ok(snapshot)
    }

    async fn save_snapshot(&self, snapshot: &SyncSnapshot) -> Result<()> {
        let mut entries = StoreEntries::new();
        entries.insert(WORDS_KEY.to_string(), serde_json::to_value(&snapshot.words)?);
        entries.insert(
            ANALYTICS_KEY.to_string(),
            serde_json::to_value(&snapshot.analytics)?,
        );
        entries.insert(
            GAMIFICATION_KEY.to_string(),
            serde_json::to_value(&snapshot.gamification)?,
        );

        self.store.set(entries).await.map_err(SyncError::local)?;
        debug!(words = snapshot.words_count(), "Saved local snapshot");
        Ok(())
    }

    async fn device_id(&self) -> Result<String> {
        let entries = self
            .store
            .get(&[DEVICE_ID_KEY])
            .await
            .map_err(SyncError::local)?;

        if let Some(id) = entries
            .get(DEVICE_ID_KEY)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
        {
            return Ok(id.to_string());
        }

        let id = Uuid::new_v4().to_string();
        let mut entries = StoreEntries::new();
        entries.insert(DEVICE_ID_KEY.to_string(), Value::String(id.clone()));
        self.store.set(entries).await.map_err(SyncError::local)?;

        info!(device_id = %id, "Generated device id");
        Ok(id)
    }

    async fn load_metadata(&self) -> Result<Option<SyncMetadata>> {
        let mut entries = self
            .store
            .get(&[METADATA_KEY])
            .await
            .map_err(SyncError::local)?;

        match entries.remove(METADATA_KEY).filter(|v| !v.is_null()) {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SyncError::Validation(format!("Sync metadata is malformed: {}", e))),
            None => Ok(None),
        }
    }

    async fn save_metadata(&self, metadata: &SyncMetadata) -> Result<()> {
        let mut entries = StoreEntries::new();
        entries.insert(METADATA_KEY.to_string(), serde_json::to_value(metadata)?);
        self.store.set(entries).await.map_err(SyncError::local)
    }

    async fn clear_metadata(&self) -> Result<()> {
        self.store
            .remove(&[METADATA_KEY])
            .await
            .map_err(SyncError::local)
    }
}
