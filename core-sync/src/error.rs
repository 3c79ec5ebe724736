use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Authentication required: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid snapshot: {0}")]
    Validation(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Sync already in progress")]
    SyncInProgress,

    #[error("Local store error: {0}")]
    LocalStore(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backup {backup_id} not found")]
    BackupNotFound { backup_id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

/// Coarse error taxonomy exposed to hosts and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncErrorKind {
    Authentication,
    Network,
    Validation,
    Codec,
    Concurrency,
    LocalStore,
    Timeout,
    NotFound,
    Config,
    Internal,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::Authentication => "authentication",
            SyncErrorKind::Network => "network",
            SyncErrorKind::Validation => "validation",
            SyncErrorKind::Codec => "codec",
            SyncErrorKind::Concurrency => "concurrency",
            SyncErrorKind::LocalStore => "localStore",
            SyncErrorKind::Timeout => "timeout",
            SyncErrorKind::NotFound => "notFound",
            SyncErrorKind::Config => "config",
            SyncErrorKind::Internal => "internal",
        }
    }
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::Authentication(_) => SyncErrorKind::Authentication,
            SyncError::Network(_) => SyncErrorKind::Network,
            SyncError::Validation(_) => SyncErrorKind::Validation,
            SyncError::Codec(_) | SyncError::Serialization(_) => SyncErrorKind::Codec,
            SyncError::SyncInProgress => SyncErrorKind::Concurrency,
            SyncError::LocalStore(_) => SyncErrorKind::LocalStore,
            SyncError::Timeout { .. } => SyncErrorKind::Timeout,
            SyncError::BackupNotFound { .. } => SyncErrorKind::NotFound,
            SyncError::Config(_) => SyncErrorKind::Config,
            SyncError::InvalidStateTransition { .. } => SyncErrorKind::Internal,
        }
    }

    /// Whether a failed attempt with this error should be retried with backoff.
    ///
    /// Concurrency rejections are answered to the caller directly. Restore
    /// and import report validation failures to their caller and never go
    /// through backoff, so only sync attempts consult this.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            SyncErrorKind::Concurrency
                | SyncErrorKind::NotFound
                | SyncErrorKind::Config
                | SyncErrorKind::Internal
        )
    }

    /// Map a bridge failure that happened while talking to the local store.
    pub fn local(err: BridgeError) -> Self {
        match err {
            BridgeError::Serialization(msg) => {
                SyncError::Validation(format!("Local data is malformed: {}", msg))
            }
            other => SyncError::LocalStore(other.to_string()),
        }
    }

    /// Map a bridge failure that happened while talking to the remote store.
    pub fn remote(err: BridgeError) -> Self {
        match err {
            BridgeError::Network(msg) => SyncError::Network(msg),
            other => SyncError::Network(other.to_string()),
        }
    }
}

impl From<core_runtime::Error> for SyncError {
    fn from(err: core_runtime::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
