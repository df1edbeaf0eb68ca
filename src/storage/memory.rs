use async_trait::async_trait;
use dashmap::DashMap;
use super::traits::{StorageMedium, StorageError};

/// Process-local medium. Records live as long as the medium itself, so an
/// `Arc<MemoryMedium>` shared across engine restarts behaves like a disk.
pub struct MemoryMedium {
    records: DashMap<String, Vec<u8>>,
}

impl MemoryMedium {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Get current record count
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw record bytes, for inspection
    #[must_use]
    pub fn raw(&self, id: &str) -> Option<Vec<u8>> {
        self.records.get(id).map(|r| r.value().clone())
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageMedium for MemoryMedium {
    async fn prepare(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.records.iter().map(|r| r.key().clone()).collect())
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.raw(id))
    }

    async fn write(&self, id: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.records.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.records.remove(id);
        Ok(())
    }

    async fn record_len(&self, id: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.records.get(id).map(|r| r.value().len() as u64))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
