//! In-process LRU store for delivery URLs.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Duration;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheEntry, CacheKey, DEFAULT_ENTRY_TTL};
use crate::domain::ports::{Clock, SystemClock};

/// Default maximum number of keys kept in memory.
pub const DEFAULT_MEMORY_CAPACITY: usize = 500;

/// Process-lifetime store for delivery URLs.
///
/// Never performs I/O, so it backs the synchronous probe. Expired entries are
/// evicted lazily when read.
pub struct MemoryUrlCache {
    cache: Mutex<LruCache<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryUrlCache {
    /// Creates a new cache with the specified capacity.
    #[must_use]
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a new cache with the default capacity and the wall clock.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY, Arc::new(SystemClock))
    }

    /// Returns a valid entry, evicting it if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut cache = self.cache.lock();

        let valid = cache.get(key).map(|entry| entry.is_valid_at(now));
        match valid {
            Some(true) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Memory cache hit");
                cache.get(key).cloned()
            }
            Some(false) => {
                cache.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Evicted expired memory entry");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Memory cache miss");
                None
            }
        }
    }

    /// Returns the URL of a valid entry.
    pub fn get_url(&self, key: &CacheKey) -> Option<String> {
        self.get(key).map(|entry| entry.url)
    }

    /// Stores an entry, replacing any previous one for the key.
    pub fn set(&self, key: CacheKey, entry: CacheEntry) {
        trace!(key = %key, expires_at = %entry.expires_at, "Storing entry in memory cache");
        self.cache.lock().put(key, entry);
    }

    /// Stores a URL that expires `ttl` from now.
    pub fn set_url(&self, key: CacheKey, url: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry::expiring_in(url, self.clock.now(), ttl);
        self.set(key, entry);
    }

    /// Stores a URL with the default entry lifetime.
    pub fn set_url_default(&self, key: CacheKey, url: impl Into<String>) {
        self.set_url(key, url, DEFAULT_ENTRY_TTL);
    }

    /// Number of entries held, expired ones included until read.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.cache.lock().clear();
        debug!("Cleared memory URL cache");
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
        }
    }
}

impl Default for MemoryUrlCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl std::fmt::Debug for MemoryUrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryUrlCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached entries.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} urls, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TransformOptions;
    use crate::domain::ports::mocks::ManualClock;

    fn key(path: &str) -> CacheKey {
        CacheKey::build(path, &TransformOptions::new())
    }

    fn cache_with_clock(capacity: usize) -> (MemoryUrlCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (MemoryUrlCache::new(capacity, clock.clone()), clock)
    }

    #[test]
    fn test_cache_set_and_get() {
        let (cache, _clock) = cache_with_clock(10);
        cache.set_url_default(key("a.png"), "https://cdn/a.png");

        assert_eq!(cache.get_url(&key("a.png")).as_deref(), Some("https://cdn/a.png"));
    }

    #[test]
    fn test_cache_miss() {
        let (cache, _clock) = cache_with_clock(10);
        assert!(cache.get(&key("nonexistent.png")).is_none());
    }

    #[test]
    fn test_expired_entry_evicted_on_read() {
        let (cache, clock) = cache_with_clock(10);
        cache.set_url(key("a.png"), "https://cdn/a.png", Duration::seconds(60));

        clock.advance(Duration::seconds(60));

        assert!(cache.get(&key("a.png")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_eviction() {
        let (cache, _clock) = cache_with_clock(2);

        cache.set_url_default(key("1.png"), "u1");
        cache.set_url_default(key("2.png"), "u2");
        cache.set_url_default(key("3.png"), "u3");

        assert!(cache.get(&key("1.png")).is_none());
        assert!(cache.get(&key("2.png")).is_some());
        assert!(cache.get(&key("3.png")).is_some());
    }

    #[test]
    fn test_cache_stats() {
        let (cache, _clock) = cache_with_clock(10);
        cache.set_url_default(key("a.png"), "u");

        let _ = cache.get(&key("a.png"));
        let _ = cache.get(&key("missing.png"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_set_replaces_entry() {
        let (cache, _clock) = cache_with_clock(10);
        cache.set_url_default(key("a.png"), "old");
        cache.set_url_default(key("a.png"), "new");

        assert_eq!(cache.get_url(&key("a.png")).as_deref(), Some("new"));
        assert_eq!(cache.len(), 1);
    }
}
