//! # Payload Codec
//!
//! Turns a [`SyncSnapshot`] into the opaque blob stored remotely and back.
//!
//! ## Format
//!
//! ```text
//! ┌─────────┬───────┬──────────────────────────────────────────┐
//! │ version │ flags │ body                                     │
//! │  1 byte │ 1 byte│ [nonce(12) ‖ AES-256-GCM(ciphertext+tag)] │
//! └─────────┴───────┴──────────────────────────────────────────┘
//! ```
//!
//! Encode is JSON → zstd (if [`FLAG_COMPRESSED`]) → AES-256-GCM (if
//! [`FLAG_ENCRYPTED`]); decode undoes the stages in reverse order. The two
//! header bytes are bound to the ciphertext as associated data, so flipping a
//! flag on an encrypted blob fails authentication instead of producing
//! garbage.

use crate::model::SyncSnapshot;
use crate::{Result, SyncError};
use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{Aes256Gcm, Key, Nonce};
use bytes::Bytes;
use core_runtime::config::SyncSettings;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Blob format version written by this codec.
pub const FORMAT_VERSION: u8 = 1;
/// Body is zstd-compressed.
pub const FLAG_COMPRESSED: u8 = 0b0000_0001;
/// Body is AES-256-GCM encrypted.
pub const FLAG_ENCRYPTED: u8 = 0b0000_0010;

const HEADER_LEN: usize = 2;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Snapshot ⇄ blob transformation.
///
/// Implementations must satisfy `decode(encode(s)) == s` for every
/// well-formed snapshot `s`.
pub trait PayloadCodec: Send + Sync {
    fn encode(&self, snapshot: &SyncSnapshot) -> Result<Bytes>;

    /// # Errors
    ///
    /// [`SyncError::Codec`] when the blob cannot be decrypted or decompressed,
    /// [`SyncError::Validation`] when it decodes to something that is not a
    /// snapshot.
    fn decode(&self, blob: &[u8]) -> Result<SyncSnapshot>;
}

/// Hex-encoded SHA-256 of a blob, sent alongside every upload.
pub fn checksum(blob: &[u8]) -> String {
    hex::encode(Sha256::digest(blob))
}

// ============================================================================
// Encryption key
// ============================================================================

/// AES-256 key for remote payloads.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKey {
    #[serde(with = "hex_serde")]
    key_bytes: Vec<u8>,
}

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self {
            key_bytes: key.to_vec(),
        }
    }

    /// Create from existing key bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(SyncError::Config(
                "Invalid key length. Expected 32 bytes for AES-256.".to_string(),
            ));
        }

        Ok(Self { key_bytes: bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.key_bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| SyncError::Config(format!("Invalid hex key: {}", e)))?;

        Self::from_bytes(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key_bytes))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key_bytes", &"[REDACTED]")
            .finish()
    }
}

mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Snapshot codec
// ============================================================================

/// zstd + AES-256-GCM codec.
///
/// Decoding honours the flags in the blob rather than the codec's own
/// settings, so a device that disabled compression still reads compressed
/// payloads from other devices. Encrypted blobs need a key.
#[derive(Clone)]
pub struct SnapshotCodec {
    compression_level: Option<i32>,
    key: Option<EncryptionKey>,
    encrypt: bool,
}

impl SnapshotCodec {
    /// Plain JSON body, no compression, no encryption.
    pub fn plain() -> Self {
        Self {
            compression_level: None,
            key: None,
            encrypt: false,
        }
    }

    pub fn with_compression(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn with_encryption(mut self, key: EncryptionKey) -> Self {
        self.key = Some(key);
        self.encrypt = true;
        self
    }

    /// Build the codec described by the user's settings.
    ///
    /// # Errors
    ///
    /// [`SyncError::Config`] if encryption is enabled but no key was supplied.
    pub fn from_settings(settings: &SyncSettings, key: Option<EncryptionKey>) -> Result<Self> {
        let mut codec = Self::plain();

        if settings.compression_enabled {
            codec = codec.with_compression(DEFAULT_COMPRESSION_LEVEL);
        }

        match (settings.encryption_enabled, key) {
            (true, Some(key)) => codec = codec.with_encryption(key),
            (true, None) => {
                return Err(SyncError::Config(
                    "Encryption is enabled but no encryption key was provided".to_string(),
                ))
            }
            // Key is still needed to read encrypted payloads from other devices
            (false, Some(key)) => codec = codec.with_decryption_key(key),
            (false, None) => {}
        }

        Ok(codec)
    }

    /// Hold a key for decoding without encrypting new payloads.
    pub fn with_decryption_key(mut self, key: EncryptionKey) -> Self {
        self.key = Some(key);
        self.encrypt = false;
        self
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.compression_level.is_some() {
            flags |= FLAG_COMPRESSED;
        }
        if self.encrypt && self.key.is_some() {
            flags |= FLAG_ENCRYPTED;
        }
        flags
    }
}

impl fmt::Debug for SnapshotCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCodec")
            .field("compression_level", &self.compression_level)
            .field("encrypt", &self.encrypt)
            .field("has_key", &self.key.is_some())
            .finish()
    }
}

impl PayloadCodec for SnapshotCodec {
    fn encode(&self, snapshot: &SyncSnapshot) -> Result<Bytes> {
        let header = [FORMAT_VERSION, self.flags()];
        let mut body = serde_json::to_vec(snapshot)?;

        if let Some(level) = self.compression_level {
            body = zstd::encode_all(body.as_slice(), level)
                .map_err(|e| SyncError::Codec(format!("Compression failed: {}", e)))?;
        }

        if let Some(key) = self.key.as_ref().filter(|_| self.encrypt) {
            let mut nonce_bytes = [0u8; NONCE_LEN];
            OsRng.fill_bytes(&mut nonce_bytes);

            let ciphertext = key
                .cipher()
                .encrypt(
                    Nonce::from_slice(&nonce_bytes),
                    Payload {
                        msg: &body,
                        aad: &header,
                    },
                )
                .map_err(|e| SyncError::Codec(format!("Encryption failed: {}", e)))?;

            body = Vec::with_capacity(NONCE_LEN + ciphertext.len());
            body.extend_from_slice(&nonce_bytes);
            body.extend_from_slice(&ciphertext);
        }

        let mut blob = Vec::with_capacity(HEADER_LEN + body.len());
        blob.extend_from_slice(&header);
        blob.extend_from_slice(&body);
        Ok(Bytes::from(blob))
    }

    fn decode(&self, blob: &[u8]) -> Result<SyncSnapshot> {
        if blob.len() < HEADER_LEN {
            return Err(SyncError::Codec("Payload too short".to_string()));
        }

        let header = [blob[0], blob[1]];
        let [version, flags] = header;

        if version != FORMAT_VERSION {
            return Err(SyncError::Codec(format!(
                "Unsupported payload version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }
        if flags & !(FLAG_COMPRESSED | FLAG_ENCRYPTED) != 0 {
            return Err(SyncError::Codec(format!("Unknown payload flags {:#04x}", flags)));
        }

        let mut body = blob[HEADER_LEN..].to_vec();

        if flags & FLAG_ENCRYPTED != 0 {
            let key = self.key.as_ref().ok_or_else(|| {
                SyncError::Codec("Payload is encrypted but no key is configured".to_string())
            })?;

            if body.len() < NONCE_LEN + TAG_LEN {
                return Err(SyncError::Codec(
                    "Invalid ciphertext: too short".to_string(),
                ));
            }

            let (nonce, ciphertext) = body.split_at(NONCE_LEN);
            body = key
                .cipher()
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: ciphertext,
                        aad: &header,
                    },
                )
                .map_err(|_| {
                    SyncError::Codec("Decryption failed: wrong key or corrupted payload".to_string())
                })?;
        }

        if flags & FLAG_COMPRESSED != 0 {
            body = zstd::decode_all(body.as_slice())
                .map_err(|e| SyncError::Codec(format!("Decompression failed: {}", e)))?;
        }

        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| SyncError::Codec(format!("Payload is not valid JSON: {}", e)))?;

        SyncSnapshot::validate_json(value)
    }
}
