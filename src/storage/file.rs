//! File-backed storage for the operator CLI.
//!
//! All records live in one JSON document mapping keys to base64-encoded values.
//! Every mutation rewrites the document through a temporary file and a rename,
//! so a crash never leaves a half-written store behind.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{child_keys, Storage, StorageEntry, StorageError, StorageResult};

/// JSON document store rooted at a single file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Open (or lazily create) a store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// Location of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::corrupted(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::io(format!("reading {}", self.path.display()), e)),
        }
    }

    async fn persist(&self, records: &BTreeMap<String, String>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| StorageError::backend(format!("encoding store: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(format!("creating {}", parent.display()), e))?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StorageError::io(format!("writing {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::io(format!("replacing {}", self.path.display()), e))?;

        debug!(path = %self.path.display(), records = records.len(), "Persisted file storage");
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<StorageEntry>> {
        let _guard = self.lock.lock().await;
        let records = self.load().await?;

        match records.get(key) {
            Some(encoded) => {
                let value = STANDARD.decode(encoded).map_err(|e| {
                    StorageError::corrupted(format!("value for '{}' is not base64: {}", key, e))
                })?;
                Ok(Some(StorageEntry { key: key.to_string(), value }))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: StorageEntry) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(entry.key, STANDARD.encode(&entry.value));
        self.persist(&records).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        if records.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&records).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let _guard = self.lock.lock().await;
        let records = self.load().await?;
        Ok(child_keys(records.keys(), prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(key: &str, value: &[u8]) -> StorageEntry {
        StorageEntry { key: key.to_string(), value: value.to_vec() }
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("store.json"));

        assert!(storage.get("config").await.unwrap().is_none());
        assert!(storage.list("host/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let storage = FileStorage::new(&path);
        storage.put(entry("host/db1", br#"{"name":"db1"}"#)).await.unwrap();
        storage.put(entry("config", &[0, 159, 255])).await.unwrap();
        drop(storage);

        let reopened = FileStorage::new(&path);
        let config = reopened.get("config").await.unwrap().unwrap();
        assert_eq!(config.value, vec![0, 159, 255]);
        assert_eq!(reopened.list("host/").await.unwrap(), vec!["db1"]);
    }

    #[tokio::test]
    async fn test_delete_missing_key_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let storage = FileStorage::new(&path);

        storage.delete("config").await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupted_document_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let storage = FileStorage::new(&path);
        let err = storage.get("config").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }
}
