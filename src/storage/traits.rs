use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Corrupted record '{id}': {reason}")]
    Corruption { id: String, reason: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Stable storage identifier for a cache key: hex-encoded SHA-256.
///
/// Any key text maps to a fixed-length `[0-9a-f]{64}` id that is safe as a
/// file name, SQL key or object name.
#[must_use]
pub fn record_id(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Persistent blob store backing the durable tier.
///
/// One record per id. Implementations only move bytes; encoding, expiry
/// and size accounting belong to [`crate::tier::DurableTier`]. Deleting or
/// measuring a missing record is not an error.
#[async_trait]
pub trait StorageMedium: Send + Sync {
    /// Establish the storage location (create directory, table, ...).
    /// Fails when the medium is unusable.
    async fn prepare(&self) -> Result<(), StorageError>;

    /// Ids of every stored record.
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create or replace a record.
    async fn write(&self, id: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Stored byte length of a record, `None` if absent.
    async fn record_len(&self, id: &str) -> Result<Option<u64>, StorageError>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}
