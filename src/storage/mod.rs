//! # Storage Substrate
//!
//! The host owns persistence. The backend only sees a flat key/value store with
//! single-key atomic `get`/`put`/`delete` and a `list` of the children below a
//! prefix. No multi-key transactions are assumed.
//!
//! Two implementations ship with the crate:
//! - [`InMemoryStorage`] for tests and embedders that manage durability themselves
//! - [`FileStorage`] backing the operator CLI with a single JSON document

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by a storage implementation.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O failure while reading or writing the underlying medium
    #[error("storage I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The underlying medium holds data that cannot be decoded
    #[error("storage data corrupted: {message}")]
    Corrupted { message: String },

    /// Implementation-specific failure
    #[error("storage backend error: {message}")]
    Backend { message: String },
}

impl StorageError {
    /// Create an I/O error with context
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Create a corrupted data error
    pub fn corrupted<S: Into<String>>(message: S) -> Self {
        Self::Corrupted { message: message.into() }
    }

    /// Create a backend error
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend { message: message.into() }
    }
}

/// A single stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub key: String,
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Build an entry holding the JSON encoding of `value`.
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> crate::Result<Self> {
        let key = key.into();
        let value = serde_json::to_vec(value).map_err(|e| {
            crate::Error::serialization(format!("failed to encode entry '{}'", key), e)
        })?;
        Ok(Self { key, value })
    }

    /// Decode the entry value as JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_slice(&self.value).map_err(|e| {
            crate::Error::serialization(format!("failed to decode entry '{}'", self.key), e)
        })
    }
}

/// Key/value store exposed to the backend by its host.
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Fetch a record, `None` when absent.
    async fn get(&self, key: &str) -> StorageResult<Option<StorageEntry>>;

    /// Create or overwrite a record.
    async fn put(&self, entry: StorageEntry) -> StorageResult<()>;

    /// Remove a record. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List the immediate children below `prefix`, in key order.
    ///
    /// Nested children are returned once, with a trailing `/`.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Collapse a sorted key sequence into the immediate children of `prefix`.
pub(crate) fn child_keys<'a, I>(keys: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = BTreeSet::new();
    let mut children = Vec::new();

    for key in keys {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        let child = match rest.find('/') {
            Some(idx) => &rest[..=idx],
            None => rest,
        };
        if seen.insert(child.to_string()) {
            children.push(child.to_string());
        }
    }

    children
}
