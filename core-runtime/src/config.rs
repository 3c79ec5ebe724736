//! # Core Configuration Module
//!
//! Provides configuration management for the sync engine.
//!
//! ## Overview
//!
//! Two layers of configuration exist:
//!
//! - [`SyncSettings`]: user-facing options (auto sync, conflict strategy,
//!   codec stages, retry budget). Serialisable, persisted in the local store
//!   under [`SYNC_SETTINGS_KEY`], editable from an options page.
//! - [`CoreConfig`]: the injected host bridges plus the settings, built with
//!   [`CoreConfigBuilder`]. It enforces fail-fast validation so a missing
//!   bridge is reported at wiring time rather than during the first sync.
//!
//! ## Required Dependencies
//!
//! - `RemoteStore` - Per-user remote payload storage
//! - `AuthProvider` - Identity for the remote store
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `LocalStore` - desktop default: JSON file in the data directory
//! - `TaskScheduler` - desktop default: tokio timers
//! - `Clock` - default: system clock
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `LocalStore` and `TaskScheduler` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ConflictStrategy, CoreConfig, SyncSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .remote_store(Arc::new(MyRemoteStore))
//!     .auth_provider(Arc::new(MyAuthProvider))
//!     .settings(SyncSettings::default().with_strategy(ConflictStrategy::Merge))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{AuthProvider, Clock, LocalStore, RemoteStore, SystemClock, TaskScheduler};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Local store key holding the serialised [`SyncSettings`].
pub const SYNC_SETTINGS_KEY: &str = "syncSettings";

// ============================================================================
// Strategy enums
// ============================================================================

/// How two divergent snapshots are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Keep the local snapshot verbatim
    Local,
    /// Keep the remote snapshot verbatim
    Remote,
    /// Field-level merge
    #[default]
    Merge,
    /// Defer to a user decision
    Ask,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Local => "local",
            ConflictStrategy::Remote => "remote",
            ConflictStrategy::Merge => "merge",
            ConflictStrategy::Ask => "ask",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(ConflictStrategy::Local),
            "remote" => Ok(ConflictStrategy::Remote),
            "merge" => Ok(ConflictStrategy::Merge),
            "ask" => Ok(ConflictStrategy::Ask),
            other => Err(Error::Config(format!(
                "Unknown conflict resolution strategy '{}'. Expected one of: local, remote, merge, ask",
                other
            ))),
        }
    }
}

/// Law used to combine the review-quality histograms of two snapshots.
///
/// `Additive` sums bucket counts and can double count reviews that were
/// already synced once; `Maximum` takes the larger count per bucket and can
/// under count reviews made on both devices. Neither is lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityMergeLaw {
    #[default]
    Additive,
    Maximum,
}

// ============================================================================
// Sync settings
// ============================================================================

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// User-facing sync options.
///
/// Durations are stored as milliseconds. Unknown keys are ignored and
/// missing keys take their default, so settings written by an older build
/// still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub auto_sync_enabled: bool,
    #[serde(with = "duration_millis")]
    pub auto_sync_interval: Duration,
    pub conflict_resolution_strategy: ConflictStrategy,
    pub compression_enabled: bool,
    pub encryption_enabled: bool,
    /// Pre-merge backups kept locally; 0 disables backups
    pub max_backup_versions: usize,
    pub sync_on_extension_start: bool,
    pub sync_on_data_change: bool,
    /// Consecutive failures after which no retry is scheduled
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub base_retry_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_retry_delay: Duration,
    /// Upper bound for every individual I/O step of a sync attempt
    #[serde(with = "duration_millis")]
    pub io_timeout: Duration,
    pub quality_distribution_merge: QualityMergeLaw,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync_enabled: true,
            auto_sync_interval: Duration::from_secs(5 * 60),
            conflict_resolution_strategy: ConflictStrategy::Merge,
            compression_enabled: true,
            encryption_enabled: false,
            max_backup_versions: 5,
            sync_on_extension_start: true,
            sync_on_data_change: true,
            max_retries: 3,
            base_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(5 * 60),
            io_timeout: Duration::from_secs(30),
            quality_distribution_merge: QualityMergeLaw::Additive,
        }
    }
}

impl SyncSettings {
    pub fn with_auto_sync(mut self, enabled: bool, interval: Duration) -> Self {
        self.auto_sync_enabled = enabled;
        self.auto_sync_interval = interval;
        self
    }

    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_resolution_strategy = strategy;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression_enabled = enabled;
        self
    }

    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption_enabled = enabled;
        self
    }

    pub fn with_max_backup_versions(mut self, versions: usize) -> Self {
        self.max_backup_versions = versions;
        self
    }

    pub fn with_sync_on_extension_start(mut self, enabled: bool) -> Self {
        self.sync_on_extension_start = enabled;
        self
    }

    pub fn with_sync_on_data_change(mut self, enabled: bool) -> Self {
        self.sync_on_data_change = enabled;
        self
    }

    /// Set the retry budget and backoff bounds.
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_retry_delay = base_delay;
        self.max_retry_delay = max_delay;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_quality_merge(mut self, law: QualityMergeLaw) -> Self {
        self.quality_distribution_merge = law;
        self
    }

    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.auto_sync_enabled && self.auto_sync_interval < Duration::from_secs(1) {
            return Err(Error::Config(
                "Auto sync interval must be at least 1 second".to_string(),
            ));
        }

        if self.base_retry_delay.is_zero() {
            return Err(Error::Config(
                "Base retry delay must be greater than 0ms".to_string(),
            ));
        }

        if self.max_retry_delay < self.base_retry_delay {
            return Err(Error::Config(format!(
                "Max retry delay ({}ms) must not be shorter than base retry delay ({}ms)",
                self.max_retry_delay.as_millis(),
                self.base_retry_delay.as_millis()
            )));
        }

        if self.io_timeout.is_zero() {
            return Err(Error::Config(
                "I/O timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.max_backup_versions > 100 {
            return Err(Error::Config(
                "Max backup versions exceeds maximum of 100".to_string(),
            ));
        }

        Ok(())
    }

    /// Load settings from the local store, falling back to defaults when
    /// nothing was saved yet.
    pub async fn load_from(store: &dyn LocalStore) -> Result<Self> {
        let entries = store
            .get(&[SYNC_SETTINGS_KEY])
            .await
            .map_err(|e| Error::Internal(format!("Failed to read sync settings: {}", e)))?;

        let settings = match entries.get(SYNC_SETTINGS_KEY) {
            Some(value) => serde_json::from_value::<SyncSettings>(value.clone())
                .map_err(|e| Error::Config(format!("Stored sync settings are malformed: {}", e)))?,
            None => {
                debug!("No stored sync settings, using defaults");
                SyncSettings::default()
            }
        };

        if let Err(e) = settings.validate() {
            warn!(error = %e, "Stored sync settings are invalid");
            return Err(e);
        }
        Ok(settings)
    }

    /// Validate and persist settings to the local store.
    pub async fn save_to(&self, store: &dyn LocalStore) -> Result<()> {
        self.validate()?;

        let value = serde_json::to_value(self)
            .map_err(|e| Error::Internal(format!("Failed to serialize sync settings: {}", e)))?;

        store
            .set([(SYNC_SETTINGS_KEY.to_string(), value)].into_iter().collect())
            .await
            .map_err(|e| Error::Internal(format!("Failed to write sync settings: {}", e)))
    }
}

// ============================================================================
// Core configuration
// ============================================================================

/// Injected bridges plus settings for the sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Device-local persistence
    pub local_store: Arc<dyn LocalStore>,

    /// Remote payload storage (required)
    pub remote_store: Arc<dyn RemoteStore>,

    /// Identity source for the remote store (required)
    pub auth_provider: Arc<dyn AuthProvider>,

    /// Timer for retries and auto sync
    pub scheduler: Arc<dyn TaskScheduler>,

    /// Time source for snapshot and metadata timestamps
    pub clock: Arc<dyn Clock>,

    pub settings: SyncSettings,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("local_store", &"LocalStore { ... }")
            .field("remote_store", &"RemoteStore { ... }")
            .field("auth_provider", &"AuthProvider { ... }")
            .field("scheduler", &"TaskScheduler { ... }")
            .field("clock", &"Clock { ... }")
            .field("settings", &self.settings)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }
}

fn missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_local_store() -> Result<Arc<dyn LocalStore>> {
    use bridge_desktop::JsonFileStore;

    let store: Arc<dyn LocalStore> = Arc::new(JsonFileStore::in_data_dir());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_local_store() -> Result<Arc<dyn LocalStore>> {
    Err(missing(
        "LocalStore",
        "LocalStore implementation is required for device-local data. \
         Desktop: enable the 'desktop-shims' feature to use the default JsonFileStore. \
         Browser extension: inject a chrome.storage.local adapter.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_scheduler() -> Result<Arc<dyn TaskScheduler>> {
    use bridge_desktop::TokioTaskScheduler;

    let scheduler = TokioTaskScheduler::current().map_err(|e| {
        missing(
            "TaskScheduler",
            &format!(
                "Default TokioTaskScheduler needs a running tokio runtime ({}). \
                 Build the config inside the runtime or inject a scheduler.",
                e
            ),
        )
    })?;
    let scheduler: Arc<dyn TaskScheduler> = Arc::new(scheduler);
    Ok(scheduler)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_scheduler() -> Result<Arc<dyn TaskScheduler>> {
    Err(missing(
        "TaskScheduler",
        "TaskScheduler implementation is required for retries and auto sync. \
         Desktop: enable the 'desktop-shims' feature to use the default TokioTaskScheduler. \
         Browser extension: inject a chrome.alarms based scheduler.",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    local_store: Option<Arc<dyn LocalStore>>,
    remote_store: Option<Arc<dyn RemoteStore>>,
    auth_provider: Option<Arc<dyn AuthProvider>>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
    clock: Option<Arc<dyn Clock>>,
    settings: Option<SyncSettings>,
}

impl CoreConfigBuilder {
    /// Sets the local store implementation.
    ///
    /// If not provided, the desktop default (JSON file) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn local_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    /// Sets the remote store implementation (required).
    pub fn remote_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote_store = Some(store);
        self
    }

    /// Sets the identity provider (required).
    pub fn auth_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    /// Sets the task scheduler.
    ///
    /// If not provided, the desktop default (tokio timers) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets the time source. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the sync settings. Defaults to [`SyncSettings::default`].
    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if a required bridge is missing or the settings are
    /// invalid.
    pub fn build(self) -> Result<CoreConfig> {
        let remote_store = self.remote_store.ok_or_else(|| {
            missing(
                "RemoteStore",
                "RemoteStore implementation is required to exchange snapshots between devices. \
                 Use .remote_store() to inject one.",
            )
        })?;

        let auth_provider = self.auth_provider.ok_or_else(|| {
            missing(
                "AuthProvider",
                "AuthProvider implementation is required to identify the remote account. \
                 Use .auth_provider() to inject one.",
            )
        })?;

        let local_store = match self.local_store {
            Some(store) => store,
            None => provide_default_local_store()?,
        };

        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => provide_default_scheduler()?,
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let config = CoreConfig {
            local_store,
            remote_store,
            auth_provider,
            scheduler,
            clock,
            settings: self.settings.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        Identity, RemotePayload, StoreEntries, TaskFactory, TaskFuture, TaskHandle, TaskId,
        UploadAck,
    };
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::Mutex;

    // Mock implementations for testing

    #[derive(Default)]
    struct MockLocalStore {
        data: Mutex<StoreEntries>,
    }

    #[async_trait]
    impl LocalStore for MockLocalStore {
        async fn get(&self, keys: &[&str]) -> BridgeResult<StoreEntries> {
            let data = self.data.lock().unwrap();
            Ok(keys
                .iter()
                .filter_map(|k| data.get(*k).map(|v| (k.to_string(), v.clone())))
                .collect())
        }

        async fn set(&self, entries: StoreEntries) -> BridgeResult<()> {
            self.data.lock().unwrap().extend(entries);
            Ok(())
        }

        async fn remove(&self, keys: &[&str]) -> BridgeResult<()> {
            let mut data = self.data.lock().unwrap();
            for key in keys {
                data.remove(*key);
            }
            Ok(())
        }
    }

    struct MockRemoteStore;

    #[async_trait]
    impl RemoteStore for MockRemoteStore {
        async fn fetch(&self, _identity: &Identity) -> BridgeResult<Option<RemotePayload>> {
            Ok(None)
        }

        async fn upload(
            &self,
            _identity: &Identity,
            blob: Bytes,
            checksum: &str,
        ) -> BridgeResult<UploadAck> {
            Ok(UploadAck {
                checksum: checksum.to_string(),
                size_bytes: blob.len() as u64,
                uploaded_at: chrono::Utc::now(),
            })
        }
    }

    struct MockAuthProvider;

    #[async_trait]
    impl AuthProvider for MockAuthProvider {
        async fn get_identity(&self) -> BridgeResult<Option<Identity>> {
            Ok(Some(Identity::new("token", "user-1")))
        }
    }

    struct NoopScheduler;

    impl TaskScheduler for NoopScheduler {
        fn schedule_once(&self, task_id: &str, _delay: Duration, _task: TaskFuture) -> TaskHandle {
            TaskHandle::new(TaskId::new(task_id), || {})
        }

        fn schedule_repeating(
            &self,
            task_id: &str,
            _period: Duration,
            _task: TaskFactory,
        ) -> TaskHandle {
            TaskHandle::new(TaskId::new(task_id), || {})
        }
    }

    fn full_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .local_store(Arc::new(MockLocalStore::default()))
            .remote_store(Arc::new(MockRemoteStore))
            .auth_provider(Arc::new(MockAuthProvider))
            .scheduler(Arc::new(NoopScheduler))
    }

    #[test]
    fn test_default_settings() {
        let settings = SyncSettings::default();
        assert!(settings.auto_sync_enabled);
        assert_eq!(settings.auto_sync_interval, Duration::from_secs(300));
        assert_eq!(settings.conflict_resolution_strategy, ConflictStrategy::Merge);
        assert!(settings.compression_enabled);
        assert!(!settings.encryption_enabled);
        assert_eq!(settings.max_backup_versions, 5);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.base_retry_delay, Duration::from_secs(1));
        assert_eq!(settings.quality_distribution_merge, QualityMergeLaw::Additive);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_serialize_camel_case() {
        let value = serde_json::to_value(SyncSettings::default()).unwrap();
        assert_eq!(value["autoSyncInterval"], json!(300_000));
        assert_eq!(value["conflictResolutionStrategy"], json!("merge"));
        assert_eq!(value["qualityDistributionMerge"], json!("additive"));
        assert_eq!(value["syncOnExtensionStart"], json!(true));
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: SyncSettings =
            serde_json::from_value(json!({"conflictResolutionStrategy": "ask"})).unwrap();
        assert_eq!(settings.conflict_resolution_strategy, ConflictStrategy::Ask);
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("remote".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Remote);
        assert_eq!(ConflictStrategy::Ask.to_string(), "ask");
        assert!(matches!("newest".parse::<ConflictStrategy>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_settings_validation() {
        let zero_delay = SyncSettings::default().with_retry(3, Duration::ZERO, Duration::from_secs(1));
        assert!(matches!(zero_delay.validate(), Err(Error::Config(_))));

        let inverted = SyncSettings::default().with_retry(
            3,
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        assert!(inverted.validate().is_err());

        let no_timeout = SyncSettings::default().with_io_timeout(Duration::ZERO);
        assert!(no_timeout.validate().is_err());

        let tiny_interval =
            SyncSettings::default().with_auto_sync(true, Duration::from_millis(10));
        assert!(tiny_interval.validate().is_err());

        // Interval is irrelevant when auto sync is off
        let disabled = SyncSettings::default().with_auto_sync(false, Duration::ZERO);
        assert!(disabled.validate().is_ok());
    }

    #[tokio::test]
    async fn test_settings_round_trip_through_store() {
        let store = MockLocalStore::default();
        assert_eq!(SyncSettings::load_from(&store).await.unwrap(), SyncSettings::default());

        let custom = SyncSettings::default()
            .with_strategy(ConflictStrategy::Remote)
            .with_encryption(true)
            .with_max_backup_versions(2);
        custom.save_to(&store).await.unwrap();

        assert_eq!(SyncSettings::load_from(&store).await.unwrap(), custom);
    }

    #[tokio::test]
    async fn test_malformed_stored_settings() {
        let store = MockLocalStore::default();
        store
            .set(
                [(SYNC_SETTINGS_KEY.to_string(), json!({"maxRetries": "three"}))]
                    .into_iter()
                    .collect(),
            )
            .await
            .unwrap();

        assert!(matches!(SyncSettings::load_from(&store).await, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_with_all_bridges() {
        let config = full_builder()
            .settings(SyncSettings::default().with_strategy(ConflictStrategy::Local))
            .build()
            .unwrap();
        assert_eq!(
            config.settings.conflict_resolution_strategy,
            ConflictStrategy::Local
        );
        let debug = format!("{:?}", config);
        assert!(debug.contains("RemoteStore { ... }"));
    }

    #[test]
    fn test_builder_missing_remote_store() {
        let result = CoreConfig::builder()
            .auth_provider(Arc::new(MockAuthProvider))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "RemoteStore")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_missing_auth_provider() {
        let result = CoreConfig::builder()
            .remote_store(Arc::new(MockRemoteStore))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "AuthProvider"
        ));
    }

    #[test]
    fn test_builder_rejects_invalid_settings() {
        let result = full_builder()
            .settings(SyncSettings::default().with_io_timeout(Duration::ZERO))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_without_shims_requires_local_store() {
        let result = CoreConfig::builder()
            .remote_store(Arc::new(MockRemoteStore))
            .auth_provider(Arc::new(MockAuthProvider))
            .scheduler(Arc::new(NoopScheduler))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "LocalStore"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_builder_uses_desktop_scheduler_inside_runtime() {
        let config = CoreConfig::builder()
            .local_store(Arc::new(MockLocalStore::default()))
            .remote_store(Arc::new(MockRemoteStore))
            .auth_provider(Arc::new(MockAuthProvider))
            .build();
        assert!(config.is_ok());
    }
}
