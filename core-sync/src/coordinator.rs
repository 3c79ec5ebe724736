//! # Sync Coordinator
//!
//! Drives sync attempts between the local store and the remote payload store.
//!
//! ## Overview
//!
//! The `SyncCoordinator` owns the single-flight flag and the persisted
//! [`SyncMetadata`]. One attempt runs these steps strictly in order:
//!
//! 1. Enter `Syncing` (a concurrent caller is rejected, nothing is touched)
//! 2. Record `lastSyncAttempt`
//! 3. Resolve the signed-in identity
//! 4. Load the local snapshot
//! 5. Fetch the remote payload, verify its checksum and decode it
//! 6. Merge with the configured strategy (consulting the [`ConflictDecider`]
//!    under `ask`)
//! 7. Back up the pre-merge local snapshot when a remote one existed
//! 8. Persist the merge result locally
//! 9. Encode and upload it
//! 10. Record the outcome, emit events, schedule a retry on failure
//!
//! Local persistence always precedes the upload, so a failed upload never loses
//! the merge. Every I/O step is bounded by `ioTimeout`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SnapshotCodec, SyncCoordinator, SyncTrigger};
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//!
//! let codec = Arc::new(SnapshotCodec::from_settings(&config.settings, None)?);
//! let coordinator = SyncCoordinator::new(config, codec, EventBus::new(100));
//!
//! coordinator.on_startup().await;
//! coordinator.start_auto_sync();
//!
//! let result = coordinator.perform_sync(SyncTrigger::Manual).await;
//! if !result.success() {
//!     eprintln!("sync failed: {:?}", result.outcome);
//! }
//! ```

use crate::backup::{BackupInfo, BackupManager, BackupReason};
use crate::codec::{checksum, PayloadCodec};
use crate::conflict::ConflictDecider;
use crate::merge::{self, MergePolicy};
use crate::metadata::SyncMetadata;
use crate::model::SyncSnapshot;
use crate::repository::{LocalSnapshotRepository, SnapshotRepository};
use crate::retry::RetryPolicy;
use crate::state::{SyncState, SyncStateCell};
use crate::{Result, SyncError, SyncErrorKind};
use bridge_traits::auth::{AuthProvider, Identity};
use bridge_traits::background::{TaskFactory, TaskFuture, TaskHandle, TaskScheduler};
use bridge_traits::storage::RemoteStore;
use bridge_traits::time::Clock;
use core_runtime::config::{ConflictStrategy, CoreConfig, SyncSettings};
use core_runtime::events::{BackupEvent, CoreEvent, EventBus, SyncEvent};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const RETRY_TASK_ID: &str = "sync-retry";
const AUTO_SYNC_TASK_ID: &str = "auto-sync";

/// Reason given to callers rejected by the single-flight check.
pub const ALREADY_IN_PROGRESS: &str = "already in progress";

// ============================================================================
// Triggers and Results
// ============================================================================

/// What started a sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTrigger {
    Startup,
    Manual,
    DataChange,
    /// Periodic timer
    Auto,
    /// Scheduled retry after the n-th consecutive failure
    Retry(u32),
}

impl SyncTrigger {
    /// Periodic attempts never show a success toast and stay quiet on
    /// failure while retries remain. Every other trigger surfaces its outcome.
    pub fn is_silent(&self) -> bool {
        matches!(self, SyncTrigger::Auto)
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTrigger::Startup => f.write_str("startup"),
            SyncTrigger::Manual => f.write_str("manual"),
            SyncTrigger::DataChange => f.write_str("dataChange"),
            SyncTrigger::Auto => f.write_str("auto"),
            SyncTrigger::Retry(n) => write!(f, "retry_{}", n),
        }
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SyncOutcome {
    #[serde(rename_all = "camelCase")]
    Succeeded { words_count: usize },
    #[serde(rename_all = "camelCase")]
    Failed {
        error: String,
        kind: SyncErrorKind,
        consecutive_failures: u32,
        /// Delay before the scheduled retry, if one was scheduled
        retry_in_ms: Option<u64>,
    },
    /// Another attempt held the sync slot; nothing was touched
    Rejected { reason: String },
    /// `ask` strategy without a decision; nothing was persisted or uploaded
    #[serde(rename_all = "camelCase")]
    ConflictPending {
        local_words: usize,
        remote_words: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// `None` for rejected calls, which never start an attempt
    pub attempt_id: Option<String>,
    pub trigger: String,
    pub outcome: SyncOutcome,
}

impl SyncResult {
    pub fn success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Succeeded { .. })
    }

    /// Human-readable reason for anything but success.
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            SyncOutcome::Succeeded { .. } => None,
            SyncOutcome::Failed { error, .. } => Some(error),
            SyncOutcome::Rejected { reason } => Some(reason),
            SyncOutcome::ConflictPending { .. } => Some("conflict pending"),
        }
    }

    fn rejected(trigger: SyncTrigger) -> Self {
        Self {
            attempt_id: None,
            trigger: trigger.to_string(),
            outcome: SyncOutcome::Rejected {
                reason: ALREADY_IN_PROGRESS.to_string(),
            },
        }
    }
}

/// Snapshot of coordinator state for hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStatus {
    pub state: SyncState,
    pub metadata: Option<SyncMetadata>,
    pub auto_sync_active: bool,
    pub retry_pending: bool,
}

enum AttemptOutcome {
    Completed { words_count: usize },
    ConflictPending { local_words: usize, remote_words: usize },
}

// ============================================================================
// Coordinator
// ============================================================================

/// Sync coordinator for one user's dataset on one device
pub struct SyncCoordinator {
    settings: SyncSettings,
    remote_store: Arc<dyn RemoteStore>,
    auth_provider: Arc<dyn AuthProvider>,
    scheduler: Arc<dyn TaskScheduler>,
    clock: Arc<dyn Clock>,
    repository: Arc<dyn SnapshotRepository>,
    backups: Arc<BackupManager>,
    codec: Arc<dyn PayloadCodec>,
    event_bus: EventBus,
    decider: Option<Arc<dyn ConflictDecider>>,
    retry_policy: RetryPolicy,
    state: SyncStateCell,
    /// Cached metadata; `None` until loaded from the repository
    metadata: Arc<Mutex<Option<SyncMetadata>>>,
    retry_handle: Arc<parking_lot::Mutex<Option<TaskHandle>>>,
    auto_sync_handle: Arc<parking_lot::Mutex<Option<TaskHandle>>>,
}

impl SyncCoordinator {
    /// Create a coordinator from injected bridges.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = CoreConfig::builder()
    ///     .remote_store(remote)
    ///     .auth_provider(auth)
    ///     .build()?;
    /// let coordinator = SyncCoordinator::new(config, codec, EventBus::new(100));
    /// ```
    pub fn new(config: CoreConfig, codec: Arc<dyn PayloadCodec>, event_bus: EventBus) -> Self {
        let repository = Arc::new(LocalSnapshotRepository::new(Arc::clone(&config.local_store)));
        let backups = Arc::new(BackupManager::new(
            Arc::clone(&config.local_store),
            config.settings.max_backup_versions,
        ));

        Self {
            retry_policy: RetryPolicy::from(&config.settings),
            settings: config.settings,
            remote_store: config.remote_store,
            auth_provider: config.auth_provider,
            scheduler: config.scheduler,
            clock: config.clock,
            repository,
            backups,
            codec,
            event_bus,
            decider: None,
            state: SyncStateCell::new(),
            metadata: Arc::new(Mutex::new(None)),
            retry_handle: Arc::new(parking_lot::Mutex::new(None)),
            auto_sync_handle: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Consult `decider` when the `ask` strategy finds diverged snapshots.
    pub fn with_conflict_decider(mut self, decider: Arc<dyn ConflictDecider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Clone for scheduled tasks (avoids Arc<Arc<...>>)
    fn clone_for_task(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            remote_store: Arc::clone(&self.remote_store),
            auth_provider: Arc::clone(&self.auth_provider),
            scheduler: Arc::clone(&self.scheduler),
            clock: Arc::clone(&self.clock),
            repository: Arc::clone(&self.repository),
            backups: Arc::clone(&self.backups),
            codec: Arc::clone(&self.codec),
            event_bus: self.event_bus.clone(),
            decider: self.decider.clone(),
            retry_policy: self.retry_policy.clone(),
            state: self.state.clone(),
            metadata: Arc::clone(&self.metadata),
            retry_handle: Arc::clone(&self.retry_handle),
            auto_sync_handle: Arc::clone(&self.auto_sync_handle),
        }
    }

    // ------------------------------------------------------------------------
    // Sync attempts
    // ------------------------------------------------------------------------

    /// Run one sync attempt.
    ///
    /// Never fails: errors are reported in the returned [`SyncOutcome`], in
    /// [`SyncMetadata`] and on the event bus.
    #[instrument(skip(self), fields(trigger = %trigger))]
    pub async fn perform_sync(&self, trigger: SyncTrigger) -> SyncResult {
        let Some(guard) = self.state.try_begin() else {
            debug!("Sync already in progress, rejecting");
            return SyncResult::rejected(trigger);
        };

        let attempt_id = Uuid::new_v4().to_string();
        let started_at = self.clock.now();
        info!(attempt_id = %attempt_id, "Sync started");

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                attempt_id: attempt_id.clone(),
                trigger: trigger.to_string(),
            }))
            .ok();

        let outcome = match self.run_attempt(trigger).await {
            Ok(AttemptOutcome::Completed { words_count }) => {
                if let Err(e) = guard.finish(SyncState::Succeeded) {
                    error!("Failed to record sync success: {}", e);
                }
                let duration_ms = (self.clock.now() - started_at).num_milliseconds().max(0) as u64;
                self.handle_success(&attempt_id, trigger, words_count, duration_ms)
                    .await
            }
            Ok(AttemptOutcome::ConflictPending {
                local_words,
                remote_words,
            }) => {
                info!(local_words, remote_words, "Sync stopped on pending conflict");
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::ConflictPending {
                        attempt_id: attempt_id.clone(),
                        trigger: trigger.to_string(),
                        local_words,
                        remote_words,
                    }))
                    .ok();
                SyncOutcome::ConflictPending {
                    local_words,
                    remote_words,
                }
            }
            Err(err) => {
                if let Err(e) = guard.finish(SyncState::Failed) {
                    error!("Failed to record sync failure: {}", e);
                }
                self.handle_failure(&attempt_id, trigger, err).await
            }
        };

        drop(guard);

        SyncResult {
            attempt_id: Some(attempt_id),
            trigger: trigger.to_string(),
            outcome,
        }
    }

    async fn run_attempt(&self, trigger: SyncTrigger) -> Result<AttemptOutcome> {
        let now = self.clock.now();
        self.update_metadata(|metadata| metadata.record_attempt(&trigger.to_string(), now))
            .await?;

        let identity = self.identity().await?;

        let local = self
            .with_timeout("load local snapshot", self.repository.load_snapshot(now))
            .await?;

        let remote = self.fetch_remote(&identity).await?;

        let policy = MergePolicy::from(&self.settings);
        let mut merged = merge::merge(local.clone(), remote.clone(), policy);

        if merged.pending_conflict {
            // Ask only reaches here when both sides hold data
            let Some(remote_snapshot) = remote.as_ref() else {
                return Err(SyncError::Validation(
                    "Conflict flagged without a remote snapshot".to_string(),
                ));
            };

            let strategy = match &self.decider {
                Some(decider) => decider.decide(&local, remote_snapshot).await.strategy(),
                None => None,
            };

            match strategy {
                Some(strategy) => {
                    debug!(strategy = %strategy, "Conflict resolved by decider");
                    merged = merge::merge(
                        local.clone(),
                        remote.clone(),
                        MergePolicy { strategy, ..policy },
                    );
                }
                None => {
                    return Ok(AttemptOutcome::ConflictPending {
                        local_words: local.words_count(),
                        remote_words: remote_snapshot.words_count(),
                    })
                }
            }
        }

        if remote.is_some() {
            self.backup(&local, BackupReason::PreMerge).await?;
        }

        merged.timestamp = self.clock.now();
        merged.pending_conflict = false;

        self.with_timeout("persist merged snapshot", self.repository.save_snapshot(&merged))
            .await?;

        let blob = self.codec.encode(&merged)?;
        let blob_checksum = checksum(&blob);
        let ack = self
            .with_timeout("upload snapshot", async {
                self.remote_store
                    .upload(&identity, blob, &blob_checksum)
                    .await
                    .map_err(SyncError::remote)
            })
            .await?;

        debug!(size_bytes = ack.size_bytes, "Uploaded merged snapshot");
        Ok(AttemptOutcome::Completed {
            words_count: merged.words_count(),
        })
    }

    async fn identity(&self) -> Result<Identity> {
        self.with_timeout("resolve identity", async {
            self.auth_provider
                .get_identity()
                .await
                .map_err(|e| SyncError::Authentication(e.to_string()))
        })
        .await?
        .ok_or_else(|| SyncError::Authentication("No signed-in user".to_string()))
    }

    async fn fetch_remote(&self, identity: &Identity) -> Result<Option<SyncSnapshot>> {
        let payload = self
            .with_timeout("fetch remote snapshot", async {
                self.remote_store
                    .fetch(identity)
                    .await
                    .map_err(SyncError::remote)
            })
            .await?;

        let Some(payload) = payload else {
            debug!("No remote snapshot yet");
            return Ok(None);
        };

        let actual = checksum(&payload.blob);
        if !actual.eq_ignore_ascii_case(&payload.checksum) {
            return Err(SyncError::Codec(format!(
                "Remote payload checksum mismatch (expected {}, got {})",
                payload.checksum, actual
            )));
        }

        let snapshot = self.codec.decode(&payload.blob)?;
        debug!(words = snapshot.words_count(), "Decoded remote snapshot");
        Ok(Some(snapshot))
    }

    async fn backup(&self, snapshot: &SyncSnapshot, reason: BackupReason) -> Result<()> {
        let created = self
            .with_timeout(
                "create backup",
                self.backups.create(snapshot, reason, self.clock.now()),
            )
            .await?;

        if let Some(info) = created {
            self.event_bus
                .emit(CoreEvent::Backup(BackupEvent::Created {
                    backup_id: info.id,
                    reason: reason.as_str().to_string(),
                    words_count: info.words_count,
                }))
                .ok();
        }
        Ok(())
    }

    async fn with_timeout<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.settings.io_timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, "I/O step timed out");
                Err(SyncError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: self.settings.io_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn handle_success(
        &self,
        attempt_id: &str,
        trigger: SyncTrigger,
        words_count: usize,
        duration_ms: u64,
    ) -> SyncOutcome {
        let now = self.clock.now();
        if let Err(e) = self
            .update_metadata(|metadata| metadata.record_success(&trigger.to_string(), words_count, now))
            .await
        {
            warn!("Failed to persist sync metadata: {}", e);
        }

        if let Some(pending) = self.retry_handle.lock().take() {
            debug!("Cancelling pending retry after success");
            pending.cancel();
        }

        info!(words_count, duration_ms, "Sync completed");
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Completed {
                attempt_id: attempt_id.to_string(),
                trigger: trigger.to_string(),
                words_count,
                duration_ms,
                notify_user: !trigger.is_silent(),
            }))
            .ok();

        SyncOutcome::Succeeded { words_count }
    }

    async fn handle_failure(
        &self,
        attempt_id: &str,
        trigger: SyncTrigger,
        err: SyncError,
    ) -> SyncOutcome {
        let now = self.clock.now();
        let message = err.to_string();

        let consecutive_failures = match self
            .update_metadata(|metadata| metadata.record_failure(&trigger.to_string(), message.clone(), now))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to persist sync metadata: {}", e);
                self.cached_failures().await
            }
        };

        let will_retry = self.retry_policy.should_retry(&err, consecutive_failures);
        let retry_delay = will_retry.then(|| self.retry_policy.delay_for(consecutive_failures));

        error!(
            kind = err.kind().as_str(),
            consecutive_failures, will_retry, "Sync failed: {}", message
        );

        if retry_delay.is_none() {
            if let Some(stale) = self.retry_handle.lock().take() {
                stale.cancel();
            }
        }

        if let Some(delay) = retry_delay {
            self.schedule_retry(consecutive_failures, delay);
            self.event_bus
                .emit(CoreEvent::Sync(SyncEvent::RetryScheduled {
                    trigger: SyncTrigger::Retry(consecutive_failures).to_string(),
                    delay_ms: delay.as_millis() as u64,
                    consecutive_failures,
                }))
                .ok();
        }

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Failed {
                attempt_id: attempt_id.to_string(),
                trigger: trigger.to_string(),
                message: message.clone(),
                kind: err.kind().as_str().to_string(),
                consecutive_failures,
                will_retry,
                notify_user: !(trigger.is_silent() && will_retry),
            }))
            .ok();

        SyncOutcome::Failed {
            error: message,
            kind: err.kind(),
            consecutive_failures,
            retry_in_ms: retry_delay.map(|d| d.as_millis() as u64),
        }
    }

    // ------------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------------

    fn retry_task(&self, retry_number: u32) -> TaskFuture {
        let coordinator = self.clone_for_task();
        Box::pin(async move {
            // A fired retry is no longer pending, even if single flight rejects it
            coordinator.retry_handle.lock().take();
            coordinator.perform_sync(SyncTrigger::Retry(retry_number)).await;
        })
    }

    fn schedule_retry(&self, retry_number: u32, delay: Duration) {
        info!(retry_number, delay_ms = delay.as_millis() as u64, "Scheduling sync retry");
        let handle = self
            .scheduler
            .schedule_once(RETRY_TASK_ID, delay, self.retry_task(retry_number));

        if let Some(previous) = self.retry_handle.lock().replace(handle) {
            previous.cancel();
        }
    }

    fn auto_sync_task(&self) -> TaskFactory {
        let coordinator = self.clone_for_task();
        Arc::new(move || {
            let coordinator = coordinator.clone_for_task();
            let task: TaskFuture = Box::pin(async move {
                coordinator.perform_sync(SyncTrigger::Auto).await;
            });
            task
        })
    }

    /// Sync once with the `startup` trigger if `syncOnExtensionStart` is set.
    pub async fn on_startup(&self) -> Option<SyncResult> {
        if !self.settings.sync_on_extension_start {
            debug!("Startup sync disabled");
            return None;
        }
        Some(self.perform_sync(SyncTrigger::Startup).await)
    }

    /// Sync with the `dataChange` trigger if `syncOnDataChange` is set.
    pub async fn notify_data_changed(&self) -> Option<SyncResult> {
        if !self.settings.sync_on_data_change {
            return None;
        }
        Some(self.perform_sync(SyncTrigger::DataChange).await)
    }

    /// Start periodic `auto` syncs every `autoSyncInterval`.
    ///
    /// Returns `false` when auto sync is disabled in settings. Restarting
    /// replaces the previous timer.
    pub fn start_auto_sync(&self) -> bool {
        if !self.settings.auto_sync_enabled {
            debug!("Auto sync disabled");
            return false;
        }

        let period = self.settings.auto_sync_interval;
        let handle = self
            .scheduler
            .schedule_repeating(AUTO_SYNC_TASK_ID, period, self.auto_sync_task());

        if let Some(previous) = self.auto_sync_handle.lock().replace(handle) {
            previous.cancel();
        }

        info!(interval_ms = period.as_millis() as u64, "Auto sync started");
        true
    }

    /// Returns whether a timer was running.
    pub fn stop_auto_sync(&self) -> bool {
        match self.auto_sync_handle.lock().take() {
            Some(handle) => {
                handle.cancel();
                info!("Auto sync stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_auto_sync_active(&self) -> bool {
        self.auto_sync_handle.lock().is_some()
    }

    // ------------------------------------------------------------------------
    // Backups, export and import
    // ------------------------------------------------------------------------

    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        self.backups.list().await
    }

    /// Replace local data with a stored backup.
    ///
    /// The current local data is itself backed up first. Never retried.
    #[instrument(skip(self))]
    pub async fn restore_backup(&self, backup_id: &str) -> Result<usize> {
        let _guard = self.state.try_begin().ok_or(SyncError::SyncInProgress)?;

        let entry = self.backups.get(backup_id).await?;
        entry.snapshot.validate()?;

        let current = self
            .with_timeout(
                "load local snapshot",
                self.repository.load_snapshot(self.clock.now()),
            )
            .await?;
        self.backup(&current, BackupReason::PreRestore).await?;

        self.with_timeout("persist restored snapshot", self.repository.save_snapshot(&entry.snapshot))
            .await?;

        let words_count = entry.snapshot.words_count();
        info!(backup_id, words_count, "Backup restored");
        self.event_bus
            .emit(CoreEvent::Backup(BackupEvent::Restored {
                backup_id: backup_id.to_string(),
                words_count,
            }))
            .ok();

        Ok(words_count)
    }

    /// Local dataset as pretty-printed JSON.
    pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
        let snapshot = self
            .with_timeout(
                "load local snapshot",
                self.repository.load_snapshot(self.clock.now()),
            )
            .await?;
        Ok(serde_json::to_vec_pretty(&snapshot)?)
    }

    /// Merge an exported snapshot into local data.
    ///
    /// Malformed input fails with [`SyncError::Validation`]; it is never
    /// retried or scheduled. Returns the merged word count.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn import_snapshot(&self, bytes: &[u8]) -> Result<usize> {
        let _guard = self.state.try_begin().ok_or(SyncError::SyncInProgress)?;

        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| SyncError::Validation(format!("Import is not valid JSON: {}", e)))?;
        let imported = SyncSnapshot::validate_json(value)?;

        let local = self
            .with_timeout(
                "load local snapshot",
                self.repository.load_snapshot(self.clock.now()),
            )
            .await?;
        self.backup(&local, BackupReason::PreImport).await?;

        let policy = MergePolicy {
            strategy: ConflictStrategy::Merge,
            ..MergePolicy::from(&self.settings)
        };
        let mut merged = merge::merge(local, Some(imported), policy);
        merged.timestamp = self.clock.now();

        self.with_timeout("persist imported snapshot", self.repository.save_snapshot(&merged))
            .await?;

        let words_count = merged.words_count();
        info!(words_count, "Snapshot imported");
        self.event_bus
            .emit(CoreEvent::Backup(BackupEvent::Imported { words_count }))
            .ok();

        Ok(words_count)
    }

    // ------------------------------------------------------------------------
    // Observability
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SyncState {
        self.state.current()
    }

    /// Persisted metadata, `None` before the first attempt.
    pub async fn metadata(&self) -> Result<Option<SyncMetadata>> {
        let mut cached = self.metadata.lock().await;
        if cached.is_none() {
            *cached = self.repository.load_metadata().await?;
        }
        Ok(cached.clone())
    }

    pub async fn status(&self) -> Result<CoordinatorStatus> {
        Ok(CoordinatorStatus {
            state: self.state(),
            metadata: self.metadata().await?,
            auto_sync_active: self.is_auto_sync_active(),
            retry_pending: self.retry_handle.lock().is_some(),
        })
    }

    /// Forget all sync history and cancel any pending retry.
    pub async fn reset_metadata(&self) -> Result<()> {
        if self.state() == SyncState::Syncing {
            return Err(SyncError::SyncInProgress);
        }

        if let Some(pending) = self.retry_handle.lock().take() {
            pending.cancel();
        }

        let mut cached = self.metadata.lock().await;
        self.repository.clear_metadata().await?;
        *cached = None;
        info!("Sync metadata reset");
        Ok(())
    }

    /// Apply `update` to the metadata and persist it.
    ///
    /// The in-memory copy is updated even if persisting fails, so failure
    /// counting survives a broken local store.
    async fn update_metadata<R>(&self, update: impl FnOnce(&mut SyncMetadata) -> R) -> Result<R> {
        let mut cached = self.metadata.lock().await;
        if cached.is_none() {
            match self.repository.load_metadata().await {
                Ok(stored) => *cached = stored,
                Err(e) => warn!("Failed to load sync metadata, starting fresh: {}", e),
            }
        }

        let metadata = cached.get_or_insert_with(SyncMetadata::default);
        let result = update(metadata);
        let snapshot = metadata.clone();

        self.with_timeout("save sync metadata", self.repository.save_metadata(&snapshot))
            .await?;
        Ok(result)
    }

    async fn cached_failures(&self) -> u32 {
        self.metadata
            .lock()
            .await
            .as_ref()
            .map(|m| m.consecutive_failures)
            .unwrap_or(0)
    }
}
