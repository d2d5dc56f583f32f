//! Asynchronous durable backend keeping one file per key.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::digest;
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::AsyncKeyValueBackend;

const RECORD_EXTENSION: &str = "kv";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    value: String,
}

/// Durable key/value backend whose operations must be awaited.
///
/// Each key lives in `<digest>.kv` holding both the key and its value, so keys
/// can be enumerated for prefix sweeps. Writes and removals are serialized so
/// the tracked size always matches the record files on disk.
pub struct DirectoryBackend {
    dir: PathBuf,
    max_bytes: u64,
    current_size: AtomicU64,
    mutation: Mutex<()>,
}

impl DirectoryBackend {
    /// Opens the store in `dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or read.
    pub async fn open(dir: PathBuf, max_bytes: u64) -> StoreResult<Self> {
        fs::create_dir_all(&dir).await?;

        let mut total_size = 0u64;
        let mut entries = fs::read_dir(&dir).await?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if is_record(&entry.path())
                && let Ok(meta) = entry.metadata().await
            {
                total_size += meta.len();
            }
        }

        debug!(dir = %dir.display(), size = total_size, "Opened directory store");

        Ok(Self {
            dir,
            max_bytes,
            current_size: AtomicU64::new(total_size),
            mutation: Mutex::new(()),
        })
    }

    /// Returns the backing directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bytes currently used by record files.
    pub fn used_bytes(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{RECORD_EXTENSION}", digest(key)))
    }

    async fn read_record(path: &Path) -> StoreResult<Option<StoredRecord>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn adjust_size(&self, removed: u64, added: u64) {
        let _ = self
            .current_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |size| {
                Some(size.saturating_sub(removed).saturating_add(added))
            });
    }

    async fn delete_record(&self, path: &Path) -> StoreResult<()> {
        let _guard = self.mutation.lock().await;
        let size = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(path).await {
            Ok(()) => {
                self.adjust_size(size, 0);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_record(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == RECORD_EXTENSION)
}

#[async_trait]
impl AsyncKeyValueBackend for DirectoryBackend {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.record_path(key);
        let record = Self::read_record(&path).await?;
        trace!(key = %key, hit = record.is_some(), "Directory store read");
        Ok(record.filter(|r| r.key == key).map(|r| r.value))
    }

    async fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.record_path(key);
        let content = serde_json::to_vec(&StoredRecord {
            key: key.to_string(),
            value: value.to_string(),
        })?;

        let _guard = self.mutation.lock().await;
        let old_size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        let new_size = content.len() as u64;
        let used = self.used_bytes().saturating_sub(old_size);
        let available = self.max_bytes.saturating_sub(used);
        if new_size > available {
            return Err(StoreError::QuotaExceeded {
                needed: new_size,
                available,
            });
        }

        let temp_path = tempfile::Builder::new()
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)?
            .into_temp_path();
        fs::write(&temp_path, &content).await?;
        temp_path.persist(&path).map_err(|e| e.error)?;

        self.adjust_size(old_size, new_size);

        trace!(key = %key, size = new_size, "Directory store write");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.delete_record(&self.record_path(key)).await
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_record(&path) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(record)) => keys.push(record.key),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Removing unreadable store record");
                    if let Err(e) = self.delete_record(&path).await {
                        warn!(path = %path.display(), error = %e, "Failed to remove store record");
                    }
                }
            }
        }

        Ok(keys)
    }
}

impl std::fmt::Debug for DirectoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryBackend")
            .field("dir", &self.dir)
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn bytes_on_disk(dir: &Path) -> (u64, usize) {
        let mut total = 0;
        let mut temp_files = 0;
        let mut entries = fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if is_record(&entry.path()) {
                total += entry.metadata().await.unwrap().len();
            } else {
                temp_files += 1;
            }
        }
        (total, temp_files)
    }

    async fn create_test_store(max_bytes: u64) -> (DirectoryBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryBackend::open(temp_dir.path().to_path_buf(), max_bytes)
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (store, _temp) = create_test_store(1024).await;
        store.write("optimized-media:a", "value").await.unwrap();

        assert_eq!(
            store.read("optimized-media:a").await.unwrap().as_deref(),
            Some("value")
        );
    }

    #[tokio::test]
    async fn test_read_miss() {
        let (store, _temp) = create_test_store(1024).await;
        assert!(store.read("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_round_trip_original_names() {
        let (store, _temp) = create_test_store(1024).await;
        store.write("p:one", "1").await.unwrap();
        store.write("other", "2").await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["other".to_string(), "p:one".to_string()]);
    }

    #[tokio::test]
    async fn test_size_tracking() {
        let (store, _temp) = create_test_store(1024).await;
        assert_eq!(store.used_bytes(), 0);

        store.write("a", "hello").await.unwrap();
        let after_first = store.used_bytes();
        assert!(after_first > 0);

        store.write("a", "hello").await.unwrap();
        assert_eq!(store.used_bytes(), after_first);

        store.remove("a").await.unwrap();
        assert_eq!(store.used_bytes(), 0);
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let (store, _temp) = create_test_store(16).await;
        let result = store.write("a", "a value that does not fit").await;
        assert!(matches!(result, Err(StoreError::QuotaExceeded { .. })));
        assert!(store.read("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_counts_existing_records() {
        let (store, temp) = create_test_store(1024).await;
        store.write("a", "value").await.unwrap();
        let used = store.used_bytes();
        drop(store);

        let reopened = DirectoryBackend::open(temp.path().to_path_buf(), 1024)
            .await
            .unwrap();
        assert_eq!(reopened.used_bytes(), used);
        assert_eq!(reopened.read("a").await.unwrap().as_deref(), Some("value"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_one_key_last_write_wins() {
        let (store, temp) = create_test_store(1024 * 1024).await;
        let store = Arc::new(store);

        let tasks: Vec<_> = (0..8)
            .map(|task| {
                let store = store.clone();
                tokio::spawn(async move {
                    for round in 0..50 {
                        let value = "x".repeat(1 + (task * 7 + round) % 40);
                        store.write("optimized-media:shared", &value).await.unwrap();
                        let read = store.read("optimized-media:shared").await.unwrap();
                        assert!(read.is_some_and(|v| v.chars().all(|c| c == 'x')));
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let (on_disk, temp_files) = bytes_on_disk(temp.path()).await;
        assert_eq!(store.used_bytes(), on_disk);
        assert_eq!(temp_files, 0);
        assert_eq!(store.keys().await.unwrap(), vec!["optimized-media:shared".to_string()]);
    }

    #[tokio::test]
    async fn test_unreadable_record_removed_from_keys() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(format!("{}.kv", digest("bad"))), "{not json")
            .await
            .unwrap();
        let store = DirectoryBackend::open(temp.path().to_path_buf(), 1024)
            .await
            .unwrap();
        store.write("good", "1").await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["good".to_string()]);
        let (on_disk, _) = bytes_on_disk(temp.path()).await;
        assert_eq!(store.used_bytes(), on_disk);
    }
}
