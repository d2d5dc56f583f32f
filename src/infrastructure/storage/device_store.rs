//! Persistent device store: expiring, namespaced cache entries on top of a
//! durable key/value backend.
//!
//! Two adapters share one contract. [`SyncDeviceStore`] wraps a backend that
//! answers immediately and can be probed during a render; [`AsyncDeviceStore`]
//! wraps a backend that must be awaited. [`DeviceStore`] tags which one a
//! deployment has so callers pick the matching binding variant.
//!
//! Store failures never reach callers. Reads that fail count as misses, and a
//! failed write triggers one sweep and one retry before it is dropped.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheEntry, CacheKey, DEFAULT_ENTRY_TTL};
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::{AsyncKeyValueBackend, Clock, SyncKeyValueBackend};

/// Prefix applied to every key this subsystem writes.
pub const DEFAULT_KEY_PREFIX: &str = "optimized-media:";

/// Default durable store quota (5 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// What a stored record decodes to.
enum Decoded {
    Valid(CacheEntry),
    Expired,
    Corrupt,
}

fn decode(raw: &str, now: DateTime<Utc>) -> Decoded {
    match serde_json::from_str::<CacheEntry>(raw) {
        Ok(entry) if entry.is_valid_at(now) => Decoded::Valid(entry),
        Ok(_) => Decoded::Expired,
        Err(_) => Decoded::Corrupt,
    }
}

fn storage_key(prefix: &str, key: &CacheKey) -> String {
    format!("{prefix}{key}")
}

/// Device store over a backend that answers without suspension.
pub struct SyncDeviceStore {
    backend: Arc<dyn SyncKeyValueBackend>,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl SyncDeviceStore {
    /// Creates a store namespaced under `prefix`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn SyncKeyValueBackend>,
        prefix: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            clock,
        }
    }

    /// Key prefix owned by this store.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns a valid entry. Expired or corrupt records are deleted.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let storage_key = storage_key(&self.prefix, key);
        let decoded = match self.backend.read(&storage_key) {
            Ok(Some(raw)) => decode(&raw, self.clock.now()),
            Ok(None) => {
                trace!(key = %key, "Device store miss");
                return None;
            }
            Err(StoreError::Serialization(e)) => {
                debug!(key = %key, error = %e, "Undecodable device store record");
                Decoded::Corrupt
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Device store read failed");
                return None;
            }
        };

        match decoded {
            Decoded::Valid(entry) => {
                trace!(key = %key, "Device store hit");
                Some(entry)
            }
            Decoded::Expired | Decoded::Corrupt => {
                debug!(key = %key, "Evicting stale device store record");
                if let Err(e) = self.backend.remove(&storage_key) {
                    warn!(key = %key, error = %e, "Failed to evict device store record");
                }
                None
            }
        }
    }

    /// Stores an entry, replacing any previous record.
    pub fn set(&self, key: &CacheKey, entry: &CacheEntry) {
        let storage_key = storage_key(&self.prefix, key);
        let raw = match serde_json::to_string(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode device store entry");
                return;
            }
        };

        if let Err(e) = self.backend.write(&storage_key, &raw) {
            debug!(key = %key, error = %e, "Device store write failed, sweeping and retrying");
            self.sweep();
            if let Err(e) = self.backend.write(&storage_key, &raw) {
                warn!(key = %key, error = %e, "Dropping device store write after retry");
            }
        }
    }

    /// Stores a URL that expires `ttl` from now.
    pub fn set_url(&self, key: &CacheKey, url: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry::expiring_in(url, self.clock.now(), ttl);
        self.set(key, &entry);
    }

    /// Stores a URL with the default entry lifetime.
    pub fn set_url_default(&self, key: &CacheKey, url: impl Into<String>) {
        self.set_url(key, url, DEFAULT_ENTRY_TTL);
    }

    /// Removes every expired or corrupt record under the prefix.
    /// Returns the number of records removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.remove_matching(|raw| !matches!(decode(raw, now), Decoded::Valid(_)))
            .unwrap_or_else(|e| {
                warn!(error = %e, "Device store sweep failed");
                0
            })
    }

    /// Removes every record under the prefix. Returns the number removed.
    pub fn clear(&self) -> usize {
        self.remove_matching(|_| true).unwrap_or_else(|e| {
            warn!(error = %e, "Device store clear failed");
            0
        })
    }

    fn remove_matching(&self, should_remove: impl Fn(&str) -> bool) -> StoreResult<usize> {
        let mut removed = 0;
        for storage_key in self.backend.keys()? {
            if !storage_key.starts_with(&self.prefix) {
                continue;
            }
            let remove = match self.backend.read(&storage_key) {
                Ok(Some(raw)) => should_remove(&raw),
                Ok(None) => false,
                Err(_) => true,
            };
            if remove && self.backend.remove(&storage_key).is_ok() {
                removed += 1;
            }
        }
        debug!(removed, prefix = %self.prefix, "Device store records removed");
        Ok(removed)
    }
}

impl std::fmt::Debug for SyncDeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDeviceStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Device store over a backend that must be awaited.
pub struct AsyncDeviceStore {
    backend: Arc<dyn AsyncKeyValueBackend>,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl AsyncDeviceStore {
    /// Creates a store namespaced under `prefix`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn AsyncKeyValueBackend>,
        prefix: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            clock,
        }
    }

    /// Key prefix owned by this store.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns a valid entry. Expired or corrupt records are deleted.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let storage_key = storage_key(&self.prefix, key);
        let decoded = match self.backend.read(&storage_key).await {
            Ok(Some(raw)) => decode(&raw, self.clock.now()),
            Ok(None) => {
                trace!(key = %key, "Device store miss");
                return None;
            }
            Err(StoreError::Serialization(e)) => {
                debug!(key = %key, error = %e, "Undecodable device store record");
                Decoded::Corrupt
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Device store read failed");
                return None;
            }
        };

        match decoded {
            Decoded::Valid(entry) => {
                trace!(key = %key, "Device store hit");
                Some(entry)
            }
            Decoded::Expired | Decoded::Corrupt => {
                debug!(key = %key, "Evicting stale device store record");
                if let Err(e) = self.backend.remove(&storage_key).await {
                    warn!(key = %key, error = %e, "Failed to evict device store record");
                }
                None
            }
        }
    }

    /// Stores an entry, replacing any previous record.
    pub async fn set(&self, key: &CacheKey, entry: &CacheEntry) {
        let storage_key = storage_key(&self.prefix, key);
        let raw = match serde_json::to_string(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode device store entry");
                return;
            }
        };

        if let Err(e) = self.backend.write(&storage_key, &raw).await {
            debug!(key = %key, error = %e, "Device store write failed, sweeping and retrying");
            self.sweep().await;
            if let Err(e) = self.backend.write(&storage_key, &raw).await {
                warn!(key = %key, error = %e, "Dropping device store write after retry");
            }
        }
    }

    /// Stores a URL that expires `ttl` from now.
    pub async fn set_url(&self, key: &CacheKey, url: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry::expiring_in(url, self.clock.now(), ttl);
        self.set(key, &entry).await;
    }

    /// Removes every expired or corrupt record under the prefix.
    /// Returns the number of records removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.remove_matching(|raw| !matches!(decode(raw, now), Decoded::Valid(_)))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Device store sweep failed");
                0
            })
    }

    /// Removes every record under the prefix. Returns the number removed.
    pub async fn clear(&self) -> usize {
        self.remove_matching(|_| true).await.unwrap_or_else(|e| {
            warn!(error = %e, "Device store clear failed");
            0
        })
    }

    async fn remove_matching(
        &self,
        should_remove: impl Fn(&str) -> bool + Send,
    ) -> StoreResult<usize> {
        let mut removed = 0;
        for storage_key in self.backend.keys().await? {
            if !storage_key.starts_with(&self.prefix) {
                continue;
            }
            let remove = match self.backend.read(&storage_key).await {
                Ok(Some(raw)) => should_remove(&raw),
                Ok(None) => false,
                Err(_) => true,
            };
            if remove && self.backend.remove(&storage_key).await.is_ok() {
                removed += 1;
            }
        }
        debug!(removed, prefix = %self.prefix, "Device store records removed");
        Ok(removed)
    }
}

impl std::fmt::Debug for AsyncDeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDeviceStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Whether the device store can be read during a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCapability {
    /// Reads complete immediately.
    Sync,
    /// Reads must be awaited.
    Async,
}

/// The device store a deployment has, tagged with its capability.
#[derive(Debug, Clone)]
pub enum DeviceStore {
    /// Backend that answers immediately.
    Sync(Arc<SyncDeviceStore>),
    /// Backend that must be awaited.
    Async(Arc<AsyncDeviceStore>),
}

impl DeviceStore {
    /// Returns the capability of the wrapped store.
    #[must_use]
    pub const fn capability(&self) -> StoreCapability {
        match self {
            Self::Sync(_) => StoreCapability::Sync,
            Self::Async(_) => StoreCapability::Async,
        }
    }

    /// Reads without suspension. Always `None` for an asynchronous store.
    #[must_use]
    pub fn probe(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self {
            Self::Sync(store) => store.get(key),
            Self::Async(_) => None,
        }
    }

    /// Reads a valid entry.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self {
            Self::Sync(store) => store.get(key),
            Self::Async(store) => store.get(key).await,
        }
    }

    /// Stores an entry.
    pub async fn set(&self, key: &CacheKey, entry: &CacheEntry) {
        match self {
            Self::Sync(store) => store.set(key, entry),
            Self::Async(store) => store.set(key, entry).await,
        }
    }

    /// Removes expired records under the prefix.
    pub async fn sweep(&self) -> usize {
        match self {
            Self::Sync(store) => store.sweep(),
            Self::Async(store) => store.sweep().await,
        }
    }

    /// Removes every record under the prefix.
    pub async fn clear(&self) -> usize {
        match self {
            Self::Sync(store) => store.clear(),
            Self::Async(store) => store.clear().await,
        }
    }
}
