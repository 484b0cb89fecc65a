//! In-memory storage.
//!
//! Backed by a `BTreeMap` so listings come back in key order.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{child_keys, Storage, StorageEntry, StorageResult};

/// Thread-safe in-memory key/value store.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<StorageEntry>> {
        let map = self.inner.read().await;
        Ok(map.get(key).map(|value| StorageEntry { key: key.to_string(), value: value.clone() }))
    }

    async fn put(&self, entry: StorageEntry) -> StorageResult<()> {
        let mut map = self.inner.write().await;
        map.insert(entry.key, entry.value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut map = self.inner.write().await;
        map.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let map = self.inner.read().await;
        Ok(child_keys(map.keys(), prefix))
    }
}
