//! Synchronous, string-keyed durable backend stored as one JSON file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::SyncKeyValueBackend;

/// Durable key/value backend that answers without suspension.
///
/// All values are mirrored in memory; every mutation rewrites the file
/// atomically. Writes that would exceed `max_bytes` fail with
/// [`StoreError::QuotaExceeded`] and leave the store untouched.
pub struct JsonFileBackend {
    path: PathBuf,
    max_bytes: u64,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileBackend {
    /// Opens the store at `path`, loading any existing contents.
    ///
    /// A malformed file is treated as empty.
    ///
    /// # Errors
    /// Returns error if the parent directory cannot be created or the file
    /// exists but cannot be read.
    pub fn open(path: PathBuf, max_bytes: u64) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed store file, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = values.len(), "Opened JSON file store");

        Ok(Self {
            path,
            max_bytes,
            values: Mutex::new(values),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> u64 {
        used_bytes(&self.values.lock())
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> StoreResult<()> {
        let content = serde_json::to_string(values)?;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| StoreError::Unavailable("invalid store path".to_string()))?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }
}

fn used_bytes(values: &BTreeMap<String, String>) -> u64 {
    values.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum()
}

impl SyncKeyValueBackend for JsonFileBackend {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut values = self.values.lock();

        let previous_size = values.get(key).map_or(0, |v| (key.len() + v.len()) as u64);
        let used = used_bytes(&values) - previous_size;
        let needed = (key.len() + value.len()) as u64;
        let available = self.max_bytes.saturating_sub(used);
        if needed > available {
            return Err(StoreError::QuotaExceeded { needed, available });
        }

        let previous = values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&values) {
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut values = self.values.lock();
        if let Some(old) = values.remove(key)
            && let Err(e) = self.persist(&values)
        {
            values.insert(key.to_string(), old);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }
}

impl std::fmt::Debug for JsonFileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileBackend")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store(max_bytes: u64) -> (JsonFileBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileBackend::open(temp_dir.path().join("store.json"), max_bytes).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_write_and_read() {
        let (store, _temp) = create_test_store(1024);
        store.write("k", "v").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_survives_reopen() {
        let (store, temp) = create_test_store(1024);
        store.write("k", "v").unwrap();
        let path = store.path().to_path_buf();
        drop(store);

        let reopened = JsonFileBackend::open(path, 1024).unwrap();
        assert_eq!(reopened.read("k").unwrap().as_deref(), Some("v"));
        drop(temp);
    }

    #[test]
    fn test_quota_exceeded_leaves_store_untouched() {
        let (store, _temp) = create_test_store(10);
        store.write("k1", "12345").unwrap();

        let result = store.write("k2", "123456");
        assert!(matches!(result, Err(StoreError::QuotaExceeded { .. })));
        assert!(store.read("k2").unwrap().is_none());
        assert_eq!(store.used_bytes(), 7);
    }

    #[test]
    fn test_overwrite_counts_replaced_value() {
        let (store, _temp) = create_test_store(10);
        store.write("k", "123456789").unwrap();
        store.write("k", "987654321").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("987654321"));
    }

    #[test]
    fn test_remove_and_keys() {
        let (store, _temp) = create_test_store(1024);
        store.write("a", "1").unwrap();
        store.write("b", "2").unwrap();
        store.remove("a").unwrap();
        store.remove("missing").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_malformed_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileBackend::open(path, 1024).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
