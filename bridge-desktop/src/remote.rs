//! Directory-backed Remote Store
//!
//! Stands in for a cloud document store on desktop builds and in
//! integration tests: every user gets a directory holding the last uploaded
//! payload.
//!
//! The checksum and the blob share one file, `sha256:<hex>\n<blob>`, which
//! is replaced through a temp file and a rename. An upload interrupted at any
//! point leaves either the previous payload or the new one, never a blob
//! paired with another blob's checksum.

use async_trait::async_trait;
use bridge_traits::{
    auth::Identity,
    error::{BridgeError, Result},
    storage::{RemotePayload, RemoteStore, UploadAck},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

const PAYLOAD_FILE: &str = "snapshot.bin";
const CHECKSUM_PREFIX: &[u8] = b"sha256:";

fn frame(checksum: &str, blob: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(CHECKSUM_PREFIX.len() + checksum.len() + 1 + blob.len());
    framed.extend_from_slice(CHECKSUM_PREFIX);
    framed.extend_from_slice(checksum.as_bytes());
    framed.push(b'\n');
    framed.extend_from_slice(blob);
    framed
}

fn unframe(mut framed: Vec<u8>) -> Result<(String, Vec<u8>)> {
    let header_end = framed
        .iter()
        .position(|b| *b == b'\n')
        .filter(|end| framed.starts_with(CHECKSUM_PREFIX) && *end >= CHECKSUM_PREFIX.len())
        .ok_or_else(|| BridgeError::Serialization("Remote payload has no checksum header".to_string()))?;

    let checksum = std::str::from_utf8(&framed[CHECKSUM_PREFIX.len()..header_end])
        .map_err(|e| BridgeError::Serialization(e.to_string()))?
        .trim()
        .to_string();
    let blob = framed.split_off(header_end + 1);
    Ok((checksum, blob))
}

/// Remote store that keeps one payload per user under `root/<user_id>/`.
pub struct DirectoryRemoteStore {
    root: PathBuf,
}

impl DirectoryRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, identity: &Identity) -> Result<PathBuf> {
        let user_id = identity.user_id.trim();
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && user_id != "."
            && user_id != "..";

        if !valid {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid user id for remote store: {:?}",
                identity.user_id
            )));
        }
        Ok(self.root.join(user_id))
    }
}

#[async_trait]
impl RemoteStore for DirectoryRemoteStore {
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn fetch(&self, identity: &Identity) -> Result<Option<RemotePayload>> {
        let dir = self.user_dir(identity)?;
        let payload_path = dir.join(PAYLOAD_FILE);

        let framed = match fs::read(&payload_path).await {
            Ok(framed) => framed,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No remote payload yet");
                return Ok(None);
            }
            Err(e) => return Err(BridgeError::Io(e)),
        };

        let (checksum, blob) = unframe(framed)?;

        let uploaded_at = fs::metadata(&payload_path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        debug!(size = blob.len(), "Fetched remote payload");
        Ok(Some(RemotePayload {
            blob: Bytes::from(blob),
            checksum,
            uploaded_at,
        }))
    }

    #[instrument(skip(self, identity, blob), fields(user_id = %identity.user_id, size = blob.len()))]
    async fn upload(&self, identity: &Identity, blob: Bytes, checksum: &str) -> Result<UploadAck> {
        let actual = hex::encode(Sha256::digest(&blob));
        if !checksum.is_empty() && !actual.eq_ignore_ascii_case(checksum) {
            return Err(BridgeError::OperationFailed(format!(
                "Checksum mismatch on upload: expected {}, computed {}",
                checksum, actual
            )));
        }

        let dir = self.user_dir(identity)?;
        fs::create_dir_all(&dir).await?;

        let tmp = dir.join(format!("{}.tmp", PAYLOAD_FILE));
        fs::write(&tmp, frame(&actual, &blob)).await?;
        fs::rename(&tmp, dir.join(PAYLOAD_FILE)).await?;

        debug!("Uploaded remote payload");
        Ok(UploadAck {
            checksum: actual,
            size_bytes: blob.len() as u64,
            uploaded_at: Utc::now(),
        })
    }
}
