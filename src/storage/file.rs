// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filesystem medium: one `<id>.json` file per record in a single directory.
//!
//! Writes land in a uuid-named `.tmp` file first and are renamed over the
//! target, so readers see either the old record or the new one. Temp files
//! left behind by a crash are removed by [`FileMedium::prepare`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::traits::{StorageError, StorageMedium};

const RECORD_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";

pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    /// Medium rooted at `dir`. Nothing touches the filesystem until
    /// [`prepare`](StorageMedium::prepare).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXT))
    }

    async fn remove_stale_temp_files(&self) -> Result<usize, StorageError> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == TEMP_EXT) {
                match fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale temp file"),
                }
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl StorageMedium for FileMedium {
    async fn prepare(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;

        let metadata = fs::metadata(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;
        if !metadata.is_dir() {
            return Err(StorageError::Backend(format!(
                "{} exists but is not a directory",
                self.dir.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(StorageError::Backend(format!(
                "{} is read-only",
                self.dir.display()
            )));
        }

        let removed = self.remove_stale_temp_files().await?;
        if removed > 0 {
            debug!(removed, dir = %self.dir.display(), "Removed stale temp files");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.record_path(id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn write(&self, id: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.record_path(id);
        let temp = self
            .dir
            .join(format!("{}.{}.{}", id, uuid::Uuid::new_v4().simple(), TEMP_EXT));

        fs::write(&temp, bytes)
            .await
            .map_err(|e| StorageError::io(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::io(path, e));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let path = self.record_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn record_len(&self, id: &str) -> Result<Option<u64>, StorageError> {
        let path = self.record_path(id);
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn prepared(tmp: &TempDir) -> FileMedium {
        let medium = FileMedium::new(tmp.path().join("ns"));
        medium.prepare().await.unwrap();
        medium
    }

    #[tokio::test]
    async fn test_prepare_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let medium = prepared(&tmp).await;

        assert!(medium.dir().is_dir());
        assert!(medium.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_fails_when_path_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a dir").unwrap();

        let medium = FileMedium::new(blocker.join("ns"));
        assert!(medium.prepare().await.is_err());
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let tmp = TempDir::new().unwrap();
        let medium = prepared(&tmp).await;

        medium.write("abc", b"{\"x\":1}").await.unwrap();
        assert_eq!(medium.read("abc").await.unwrap(), Some(b"{\"x\":1}".to_vec()));
        assert_eq!(medium.record_len("abc").await.unwrap(), Some(7));
        assert_eq!(medium.list().await.unwrap(), vec!["abc".to_string()]);

        medium.delete("abc").await.unwrap();
        assert!(medium.read("abc").await.unwrap().is_none());
        assert!(medium.record_len("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_records_are_not_errors() {
        let tmp = TempDir::new().unwrap();
        let medium = prepared(&tmp).await;

        assert!(medium.read("nope").await.unwrap().is_none());
        assert!(medium.delete("nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let medium = prepared(&tmp).await;

        medium.write("k", b"one").await.unwrap();
        medium.write("k", b"two").await.unwrap();

        assert_eq!(medium.read("k").await.unwrap(), Some(b"two".to_vec()));
        let files: Vec<_> = std::fs::read_dir(medium.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_sweeps_stale_temp_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("ns");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("abc.deadbeef.tmp"), b"half written").unwrap();
        std::fs::write(dir.join("abc.json"), b"{}").unwrap();

        let medium = FileMedium::new(&dir);
        medium.prepare().await.unwrap();

        assert!(!dir.join("abc.deadbeef.tmp").exists());
        assert_eq!(medium.list().await.unwrap(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn test_list_ignores_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let medium = prepared(&tmp).await;
        std::fs::write(medium.dir().join("README.txt"), b"hello").unwrap();
        medium.write("rec", b"{}").await.unwrap();

        assert_eq!(medium.list().await.unwrap(), vec!["rec".to_string()]);
    }
}
