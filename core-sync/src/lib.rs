//! # Sync Engine
//!
//! Reconciles a learner's vocabulary dataset between devices.
//!
//! ## Overview
//!
//! Each device keeps its own copy of the dataset. A sync attempt loads the
//! local snapshot, fetches the remote one, merges them, persists the result
//! locally and uploads it again. The merge is a pure function; everything
//! with side effects goes through injected bridges.
//!
//! ## Components
//!
//! - **Model** (`model`): Vocabulary records, SRS scheduling, analytics, gamification
//! - **Merge Engine** (`merge`): Strategy-driven, field-level snapshot reconciliation
//! - **Payload Codec** (`codec`): zstd + AES-256-GCM blob encoding
//! - **Repository** (`repository`): Typed access to the host's local store
//! - **Backups** (`backup`): Pre-merge snapshots with pruning, restore and import
//! - **State Machine** (`state`): Single-flight `Idle → Syncing → outcome` flag
//! - **Sync Coordinator** (`coordinator`): Attempts, retries, triggers, events

pub mod backup;
pub mod codec;
pub mod conflict;
pub mod coordinator;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod model;
pub mod repository;
pub mod retry;
pub mod state;

pub use error::{Result, SyncError, SyncErrorKind};
pub use backup::{BackupEntry, BackupInfo, BackupManager, BackupReason};
pub use codec::{checksum, EncryptionKey, PayloadCodec, SnapshotCodec};
pub use conflict::{ConflictDecider, ConflictResolution};
pub use coordinator::{
    CoordinatorStatus, SyncCoordinator, SyncOutcome, SyncResult, SyncTrigger, ALREADY_IN_PROGRESS,
};
pub use merge::{merge, MergePolicy};
pub use metadata::SyncMetadata;
pub use model::{
    AnalyticsSnapshot, CompletedChallenge, DailyStats, GamificationState, SrsState, SyncSnapshot,
    VocabularyRecord,
};
pub use repository::{LocalSnapshotRepository, SnapshotRepository};
pub use retry::RetryPolicy;
pub use state::{SyncGuard, SyncState, SyncStateCell};
