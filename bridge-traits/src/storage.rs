//! Storage Abstractions
//!
//! Provides platform-agnostic traits for the two places a snapshot lives:
//! the device-local key/value store and the per-user remote document store.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::auth::Identity;
use crate::error::Result;

/// Values returned by or written to a [`LocalStore`], keyed by collection name.
pub type StoreEntries = HashMap<String, Value>;

/// Device-local key/value persistence.
///
/// Abstracts host storage mechanisms:
/// - Desktop: JSON file in the application data directory
/// - Browser extension: `chrome.storage.local`
/// - Mobile: app sandbox preferences / SQLite
///
/// Keys that are absent from the store are simply absent from the map
/// returned by [`get`](LocalStore::get); that is not an error.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::LocalStore;
///
/// async fn word_count(store: &dyn LocalStore) -> Result<usize> {
///     let entries = store.get(&["words"]).await?;
///     Ok(entries
///         .get("words")
///         .and_then(|v| v.as_array())
///         .map(|a| a.len())
///         .unwrap_or(0))
/// }
/// ```
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read the given keys. Missing keys are omitted from the result.
    async fn get(&self, keys: &[&str]) -> Result<StoreEntries>;

    /// Write all entries, replacing existing values.
    async fn set(&self, entries: StoreEntries) -> Result<()>;

    /// Delete the given keys. Removing an absent key is a no-op.
    async fn remove(&self, keys: &[&str]) -> Result<()>;
}

/// An encoded snapshot as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePayload {
    /// Opaque codec output
    pub blob: Bytes,
    /// Hex-encoded SHA-256 of `blob`, as supplied at upload time
    pub checksum: String,
    /// When the payload was written, if the store tracks it
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Acknowledgement returned by [`RemoteStore::upload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAck {
    pub checksum: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Remote document store keyed by authenticated identity.
///
/// Exactly one payload is kept per user. Implementations may fail
/// transiently; callers are expected to retry.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the user's payload, or `None` if nothing was uploaded yet.
    async fn fetch(&self, identity: &Identity) -> Result<Option<RemotePayload>>;

    /// Replace the user's payload.
    async fn upload(&self, identity: &Identity, blob: Bytes, checksum: &str) -> Result<UploadAck>;
}
