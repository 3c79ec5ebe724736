//! Local Key/Value Store backed by a JSON file

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{LocalStore, StoreEntries},
};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File name used inside the data directory.
const STORE_FILE_NAME: &str = "vocab-sync-store.json";

/// JSON-file-backed local store.
///
/// All collections live in a single JSON object. The whole object is kept in
/// memory and written back on every mutation through a temp file and rename,
/// so a crash mid-write never leaves a truncated store behind.
///
/// `in_memory()` skips the file entirely (for testing).
pub struct JsonFileStore {
    path: Option<PathBuf>,
    cache: Mutex<Option<Map<String, Value>>>,
}

impl JsonFileStore {
    /// Store the collections at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cache: Mutex::new(None),
        }
    }

    /// Store the collections under the platform data directory.
    pub fn in_data_dir() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("vocab-sync");

        Self::new(data_dir.join(STORE_FILE_NAME))
    }

    /// Create a store that never touches disk (for testing)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: Mutex::new(Some(Map::new())),
        }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn load(path: &Path) -> Result<Map<String, Value>> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "Store file missing, starting empty");
                return Ok(Map::new());
            }
            Err(e) => return Err(BridgeError::Io(e)),
        };

        match serde_json::from_slice::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            other => {
                warn!(path = ?path, kind = %json_kind(&other), "Store file is not a JSON object, ignoring it");
                Ok(Map::new())
            }
        }
    }

    async fn persist(path: &Path, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, path).await?;
        debug!(path = ?path, size = bytes.len(), "Persisted local store");
        Ok(())
    }

    /// Run `f` against the loaded map, writing it back when `dirty` is returned.
    async fn with_map<T>(&self, f: impl FnOnce(&mut Map<String, Value>) -> (T, bool)) -> Result<T> {
        let mut guard = self.cache.lock().await;

        if guard.is_none() {
            let loaded = match &self.path {
                Some(path) => Self::load(path).await?,
                None => Map::new(),
            };
            *guard = Some(loaded);
        }

        let map = guard
            .as_mut()
            .ok_or_else(|| BridgeError::OperationFailed("Store cache unavailable".to_string()))?;

        let (out, dirty) = f(map);
        if dirty {
            if let Some(path) = &self.path {
                Self::persist(path, map).await?;
            }
        }
        Ok(out)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<StoreEntries> {
        self.with_map(|map| {
            let entries = keys
                .iter()
                .filter_map(|k| map.get(*k).map(|v| ((*k).to_string(), v.clone())))
                .collect::<StoreEntries>();
            (entries, false)
        })
        .await
    }

    async fn set(&self, entries: StoreEntries) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.with_map(|map| {
            for (key, value) in entries {
                map.insert(key, value);
            }
            ((), true)
        })
        .await
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.with_map(|map| {
            let mut removed = false;
            for key in keys {
                removed |= map.remove(*key).is_some();
            }
            ((), removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::env;

    fn entries(pairs: &[(&str, Value)]) -> StoreEntries {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_in_memory_get_set_remove() {
        let store = JsonFileStore::in_memory();

        store
            .set(entries(&[("deviceId", json!("device-a")), ("words", json!([]))]))
            .await
            .unwrap();

        let got = store.get(&["deviceId", "missing"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got.get("deviceId"), Some(&json!("device-a")));

        store.remove(&["deviceId", "missing"]).await.unwrap();
        assert!(store.get(&["deviceId"]).await.unwrap().is_empty());
        assert!(store.get(&["words"]).await.unwrap().contains_key("words"));
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = env::temp_dir().join(format!("vocab-sync-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join(STORE_FILE_NAME);

        let store = JsonFileStore::new(&path);
        store
            .set(entries(&[("syncSettings", json!({"autoSync": false}))]))
            .await
            .unwrap();

        let reopened = JsonFileStore::new(&path);
        let got = reopened.get(&["syncSettings"]).await.unwrap();
        assert_eq!(got.get("syncSettings"), Some(&json!({"autoSync": false})));
        assert!(!path.with_extension("json.tmp").exists());

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let path = env::temp_dir()
            .join(format!("vocab-sync-missing-{}", uuid::Uuid::new_v4()))
            .join(STORE_FILE_NAME);
        let store = JsonFileStore::new(&path);

        assert!(store.get(&["words"]).await.unwrap().is_empty());
        assert!(!path.exists());
    }
}
