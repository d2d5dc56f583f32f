//! Optimized media resolver.
//!
//! Reads go through the persistent device store, then process memory, and
//! only then to the signing endpoint. A fresh result is written back to both
//! tiers before it is returned.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::signing_transform::SigningTransformClient;
use crate::domain::entities::{CacheKey, MediaReference, MediaSource, TransformOptions};
use crate::domain::errors::{MediaError, MediaResult};
use crate::infrastructure::image::MemoryUrlCache;
use crate::infrastructure::storage::DeviceStore;

/// A delivery URL and the tier it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    /// Transformed delivery URL.
    pub url: String,
    /// Where the URL was found.
    pub source: MediaSource,
}

type InFlight = Shared<BoxFuture<'static, MediaResult<ResolvedMedia>>>;

struct ResolverInner {
    memory: Arc<MemoryUrlCache>,
    device: Option<DeviceStore>,
    client: SigningTransformClient,
    in_flight: Option<Mutex<HashMap<CacheKey, InFlight>>>,
}

/// Resolves media references to delivery URLs through the cache tiers.
///
/// Cloning is cheap; clones share the same stores.
#[derive(Clone)]
pub struct MediaResolver {
    inner: Arc<ResolverInner>,
}

impl MediaResolver {
    /// Creates a resolver. Concurrent identical resolutions each reach the
    /// signing endpoint.
    #[must_use]
    pub fn new(
        memory: Arc<MemoryUrlCache>,
        device: Option<DeviceStore>,
        client: SigningTransformClient,
    ) -> Self {
        Self::build(memory, device, client, false)
    }

    /// Creates a resolver that shares one in-flight signing call between
    /// concurrent identical resolutions.
    #[must_use]
    pub fn with_single_flight(
        memory: Arc<MemoryUrlCache>,
        device: Option<DeviceStore>,
        client: SigningTransformClient,
    ) -> Self {
        Self::build(memory, device, client, true)
    }

    fn build(
        memory: Arc<MemoryUrlCache>,
        device: Option<DeviceStore>,
        client: SigningTransformClient,
        single_flight: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                memory,
                device,
                client,
                in_flight: single_flight.then(|| Mutex::new(HashMap::new())),
            }),
        }
    }

    /// Process memory tier.
    #[must_use]
    pub fn memory(&self) -> &Arc<MemoryUrlCache> {
        &self.inner.memory
    }

    /// Persistent device tier, if the deployment has one.
    #[must_use]
    pub fn device(&self) -> Option<&DeviceStore> {
        self.inner.device.as_ref()
    }

    /// Returns true if concurrent identical resolutions are shared.
    #[must_use]
    pub fn is_single_flight(&self) -> bool {
        self.inner.in_flight.is_some()
    }

    /// Checks process memory only. Never performs I/O.
    #[must_use]
    pub fn peek(&self, reference: &MediaReference, options: &TransformOptions) -> Option<String> {
        let path = reference.as_path()?;
        self.inner.memory.get_url(&CacheKey::build(path, options))
    }

    /// Checks process memory, then a synchronous device store.
    ///
    /// A device hit warms memory. An asynchronous device store is skipped.
    #[must_use]
    pub fn probe(&self, reference: &MediaReference, options: &TransformOptions) -> Option<String> {
        let path = reference.as_path()?;
        let key = CacheKey::build(path, options);
        if let Some(url) = self.inner.memory.get_url(&key) {
            return Some(url);
        }

        let entry = self.inner.device.as_ref()?.probe(&key)?;
        trace!(key = %key, "Warming memory from device store probe");
        self.inner.memory.set(key, entry.clone());
        Some(entry.url)
    }

    /// Resolves a reference, reporting where the URL came from.
    ///
    /// # Errors
    /// Returns [`MediaError::Input`] for references without a storage path,
    /// or the signing client's error when the slow path fails.
    pub async fn try_resolve(
        &self,
        reference: &MediaReference,
        options: &TransformOptions,
    ) -> MediaResult<ResolvedMedia> {
        let Some(path) = reference.as_path() else {
            return Err(MediaError::input("reference has no storage path"));
        };
        let key = CacheKey::build(path, options);

        if let Some(device) = &self.inner.device
            && let Some(entry) = device.get(&key).await
        {
            trace!(key = %key, "Resolved from device store");
            self.inner.memory.set(key, entry.clone());
            return Ok(ResolvedMedia {
                url: entry.url,
                source: MediaSource::DeviceStore,
            });
        }

        if let Some(url) = self.inner.memory.get_url(&key) {
            return Ok(ResolvedMedia {
                url,
                source: MediaSource::MemoryCache,
            });
        }

        match &self.inner.in_flight {
            Some(in_flight) => {
                let shared = {
                    let mut map = in_flight.lock();
                    map.entry(key.clone())
                        .or_insert_with(|| self.shared_slow_path(key, path.to_string(), *options))
                        .clone()
                };
                shared.await
            }
            None => self.slow_path(&key, path, options).await,
        }
    }

    /// Resolves a reference to a delivery URL, or `None` on any failure.
    pub async fn resolve(
        &self,
        reference: &MediaReference,
        options: &TransformOptions,
    ) -> Option<String> {
        match self.try_resolve(reference, options).await {
            Ok(resolved) => Some(resolved.url),
            Err(e) => {
                debug!(reference = ?reference, error = %e, "Resolution fell back");
                None
            }
        }
    }

    fn shared_slow_path(
        &self,
        key: CacheKey,
        path: String,
        options: TransformOptions,
    ) -> InFlight {
        let this = self.clone();
        async move {
            let result = this.slow_path(&key, &path, &options).await;
            if let Some(in_flight) = &this.inner.in_flight {
                in_flight.lock().remove(&key);
            }
            result
        }
        .boxed()
        .shared()
    }

    async fn slow_path(
        &self,
        key: &CacheKey,
        path: &str,
        options: &TransformOptions,
    ) -> MediaResult<ResolvedMedia> {
        let delivery = self.inner.client.resolve(path, options).await?;

        self.inner.memory.set(key.clone(), delivery.entry.clone());
        if let Some(device) = &self.inner.device {
            device.set(key, &delivery.entry).await;
        }
        debug!(key = %key, expires_at = %delivery.entry.expires_at, "Wrote resolved URL to cache tiers");

        Ok(ResolvedMedia {
            url: delivery.entry.url,
            source: MediaSource::Signing,
        })
    }
}

impl std::fmt::Debug for MediaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResolver")
            .field("memory", &self.inner.memory)
            .field("device", &self.inner.device)
            .field("single_flight", &self.is_single_flight())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::domain::entities::{CacheEntry, ImageFormat, TtlPolicy};
    use crate::domain::ports::Clock;
    use crate::domain::ports::mocks::{ManualClock, MockKeyValueBackend, MockSigningPort};
    use crate::infrastructure::image::QueryTransformBuilder;
    use crate::infrastructure::storage::{AsyncDeviceStore, DEFAULT_KEY_PREFIX, SyncDeviceStore};

    struct Fixture {
        signer: Arc<MockSigningPort>,
        clock: Arc<ManualClock>,
        backend: Arc<MockKeyValueBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                signer: Arc::new(MockSigningPort::new()),
                clock: Arc::new(ManualClock::new()),
                backend: Arc::new(MockKeyValueBackend::new()),
            }
        }

        fn client(&self) -> SigningTransformClient {
            SigningTransformClient::new(
                self.signer.clone(),
                Arc::new(QueryTransformBuilder::new()),
                self.clock.clone(),
                TtlPolicy::default(),
            )
        }

        fn memory(&self) -> Arc<MemoryUrlCache> {
            Arc::new(MemoryUrlCache::new(10, self.clock.clone()))
        }

        fn sync_device(&self) -> DeviceStore {
            DeviceStore::Sync(Arc::new(SyncDeviceStore::new(
                self.backend.clone(),
                DEFAULT_KEY_PREFIX,
                self.clock.clone(),
            )))
        }

        fn async_device(&self) -> DeviceStore {
            DeviceStore::Async(Arc::new(AsyncDeviceStore::new(
                self.backend.clone(),
                DEFAULT_KEY_PREFIX,
                self.clock.clone(),
            )))
        }

        fn resolver(&self) -> MediaResolver {
            MediaResolver::new(self.memory(), Some(self.sync_device()), self.client())
        }
    }

    fn avatar_options() -> TransformOptions {
        TransformOptions::square(100)
            .with_quality(50)
            .with_format(ImageFormat::Webp)
    }

    fn avatar() -> MediaReference {
        MediaReference::path("avatars/u1.png")
    }

    #[tokio::test]
    async fn test_slow_path_writes_both_tiers() {
        let fx = Fixture::new();
        let resolver = fx.resolver();

        let resolved = resolver
            .try_resolve(&avatar(), &avatar_options())
            .await
            .unwrap();

        let expected_url = "https://cdn/raw/avatars/u1.png?sig=X&width=100&height=100&quality=50&format=webp&cache=true";
        assert_eq!(resolved.source, MediaSource::Signing);
        assert_eq!(resolved.url, expected_url);

        let key = CacheKey::build("avatars/u1.png", &avatar_options());
        let expected_expiry = fx.clock.now() + Duration::seconds(3300);
        let memory_entry = resolver.memory().get(&key).unwrap();
        let device_entry = resolver.device().unwrap().get(&key).await.unwrap();
        assert_eq!(memory_entry, CacheEntry::new(expected_url, expected_expiry));
        assert_eq!(device_entry, memory_entry);
    }

    #[tokio::test]
    async fn test_repeat_within_ttl_does_not_sign_again() {
        let fx = Fixture::new();
        let resolver = fx.resolver();

        resolver.resolve(&avatar(), &avatar_options()).await.unwrap();
        fx.clock.advance(Duration::seconds(3000));
        let second = resolver
            .try_resolve(&avatar(), &avatar_options())
            .await
            .unwrap();

        assert_eq!(second.source, MediaSource::DeviceStore);
        assert_eq!(fx.signer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_signs_again() {
        let fx = Fixture::new();
        let resolver = fx.resolver();

        resolver.resolve(&avatar(), &avatar_options()).await.unwrap();
        fx.clock.advance(Duration::seconds(3300));
        resolver.resolve(&avatar(), &avatar_options()).await.unwrap();

        assert_eq!(fx.signer.call_count(), 2);
    }

    #[tokio::test]
    async fn test_device_hit_warms_memory() {
        let fx = Fixture::new();
        let key = CacheKey::build("avatars/u1.png", &avatar_options());
        let device = fx.sync_device();
        device
            .set(&key, &CacheEntry::expiring_in("https://cdn/cached", fx.clock.now(), Duration::seconds(60)))
            .await;
        let resolver = MediaResolver::new(fx.memory(), Some(device), fx.client());

        assert!(resolver.peek(&avatar(), &avatar_options()).is_none());
        let url = resolver.resolve(&avatar(), &avatar_options()).await;

        assert_eq!(url.as_deref(), Some("https://cdn/cached"));
        assert_eq!(
            resolver.peek(&avatar(), &avatar_options()).as_deref(),
            Some("https://cdn/cached")
        );
        assert_eq!(fx.signer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_reads_sync_device_but_not_async() {
        let fx = Fixture::new();
        let key = CacheKey::build("avatars/u1.png", &avatar_options());
        let entry = CacheEntry::expiring_in("https://cdn/cached", fx.clock.now(), Duration::seconds(60));

        let sync_device = fx.sync_device();
        sync_device.set(&key, &entry).await;
        let sync_resolver = MediaResolver::new(fx.memory(), Some(sync_device), fx.client());
        assert_eq!(
            sync_resolver.probe(&avatar(), &avatar_options()).as_deref(),
            Some("https://cdn/cached")
        );

        let async_resolver = MediaResolver::new(fx.memory(), Some(fx.async_device()), fx.client());
        assert!(async_resolver.probe(&avatar(), &avatar_options()).is_none());
    }

    #[tokio::test]
    async fn test_memory_only_deployment() {
        let fx = Fixture::new();
        let resolver = MediaResolver::new(fx.memory(), None, fx.client());

        resolver.resolve(&avatar(), &avatar_options()).await.unwrap();
        let second = resolver
            .try_resolve(&avatar(), &avatar_options())
            .await
            .unwrap();

        assert_eq!(second.source, MediaSource::MemoryCache);
        assert_eq!(fx.signer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_signing_failure_resolves_to_none() {
        let fx = Fixture::new();
        fx.signer.fail("avatars/u1.png");
        let resolver = fx.resolver();

        assert!(resolver.resolve(&avatar(), &avatar_options()).await.is_none());
        assert!(resolver.memory().is_empty());
        assert_eq!(fx.backend.len(), 0);
    }

    #[tokio::test]
    async fn test_durable_write_failure_still_returns_url() {
        let fx = Fixture::new();
        fx.backend.fail_writes(2);
        let resolver = fx.resolver();

        let url = resolver.resolve(&avatar(), &avatar_options()).await;

        assert!(url.is_some());
        assert_eq!(resolver.memory().len(), 1);
        assert_eq!(fx.backend.len(), 0);
    }

    #[tokio::test]
    async fn test_absent_reference_is_input_error() {
        let fx = Fixture::new();
        let resolver = fx.resolver();

        let err = resolver
            .try_resolve(&MediaReference::Absent, &avatar_options())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Input { .. }));
        assert_eq!(fx.signer.call_count(), 0);
    }

    #[test]
    fn test_hung_signing_keeps_resolution_pending() {
        let fx = Fixture::new();
        let resolver = fx.resolver();
        let release = fx.signer.hold("avatars/u1.png");
        let (reference, options) = (avatar(), avatar_options());

        let mut resolution = tokio_test::task::spawn(resolver.try_resolve(&reference, &options));
        tokio_test::assert_pending!(resolution.poll());
        tokio_test::assert_pending!(resolution.poll());

        release.notify_one();
        assert!(resolution.is_woken());
        let resolved = tokio_test::assert_ready_ok!(resolution.poll());
        assert_eq!(resolved.source, MediaSource::Signing);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_not_deduplicated_by_default() {
        let fx = Fixture::new();
        let resolver = MediaResolver::new(fx.memory(), None, fx.client());
        let release = fx.signer.hold("avatars/u1.png");

        let first = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(&avatar(), &avatar_options()).await }
        });
        let second = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(&avatar(), &avatar_options()).await }
        });
        while fx.signer.call_count() < 2 {
            tokio::task::yield_now().await;
        }
        release.notify_waiters();

        assert!(first.await.unwrap().is_some());
        assert!(second.await.unwrap().is_some());
        assert_eq!(fx.signer.calls_for("avatars/u1.png"), 2);
    }

    #[tokio::test]
    async fn test_single_flight_shares_one_call() {
        let fx = Fixture::new();
        let resolver = MediaResolver::with_single_flight(fx.memory(), None, fx.client());
        let release = fx.signer.hold("avatars/u1.png");

        let first = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.try_resolve(&avatar(), &avatar_options()).await }
        });
        let second = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.try_resolve(&avatar(), &avatar_options()).await }
        });
        while fx.signer.call_count() < 1 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        release.notify_one();

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.url, second.url);
        assert_eq!(fx.signer.call_count(), 1);
        assert!(resolver.inner.in_flight.as_ref().unwrap().lock().is_empty());
    }
}
