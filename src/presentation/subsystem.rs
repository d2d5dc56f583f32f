//! Composition root for the media cache.
//!
//! Built once at start-up. Owns the single memory store and device store
//! instances and hands out resolver, preloader and bindings that share them.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::binding::{AsyncMediaBinding, SyncMediaBinding};
use crate::application::services::{MediaResolver, Preloader, SigningTransformClient};
use crate::domain::errors::MediaError;
use crate::domain::ports::{Clock, SigningPort, SystemClock};
use crate::infrastructure::config::{BackendKind, InvalidConfig, MediaConfig};
use crate::infrastructure::image::{CacheStats, MemoryUrlCache, QueryTransformBuilder};
use crate::infrastructure::signing::HttpSigningClient;
use crate::infrastructure::storage::{
    AsyncDeviceStore, DeviceStore, DirectoryBackend, JsonFileBackend, StoreCapability,
    SyncDeviceStore,
};

/// Errors that prevent the subsystem from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] InvalidConfig),
    /// Signing client could not be built.
    #[error("signing client: {0}")]
    Signing(#[from] MediaError),
}

/// The running media cache.
#[derive(Debug)]
pub struct MediaSubsystem {
    resolver: MediaResolver,
    preloader: Preloader,
    runtime: Handle,
    swept_at_start: usize,
}

impl MediaSubsystem {
    /// Starts the subsystem against the configured signing endpoint.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub async fn start(config: &MediaConfig) -> Result<Self, StartupError> {
        config.validate()?;
        let signer = HttpSigningClient::with_options(
            config.signing.endpoint.clone(),
            config.signing.api_key.clone(),
            config.signing.timeout_secs.map(Duration::from_secs),
        )?;
        Self::with_signer(config, Arc::new(signer), Arc::new(SystemClock)).await
    }

    /// Starts the subsystem with an explicit signer and clock.
    ///
    /// The endpoint setting is not required here. A device store that cannot
    /// be opened leaves the subsystem running on process memory alone.
    ///
    /// # Errors
    /// Returns error if the TTL settings are inconsistent.
    pub async fn with_signer(
        config: &MediaConfig,
        signer: Arc<dyn SigningPort>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StartupError> {
        let policy = config.ttl_policy().map_err(InvalidConfig::from)?;

        let memory = Arc::new(MemoryUrlCache::new(
            config.cache.memory_capacity,
            clock.clone(),
        ));
        let device = open_device_store(config, clock.clone()).await;

        let swept_at_start = match &device {
            Some(device) => device.sweep().await,
            None => 0,
        };

        let client = SigningTransformClient::new(
            signer,
            Arc::new(QueryTransformBuilder::new()),
            clock,
            policy,
        );
        let resolver = if config.cache.single_flight {
            MediaResolver::with_single_flight(memory, device, client)
        } else {
            MediaResolver::new(memory, device, client)
        };
        let preloader = Preloader::new(resolver.clone(), config.preload.limit);

        info!(
            backend = ?config.cache.backend,
            single_flight = config.cache.single_flight,
            swept = swept_at_start,
            "Media subsystem started"
        );

        Ok(Self {
            resolver,
            preloader,
            runtime: Handle::current(),
            swept_at_start,
        })
    }

    /// Opens the configured device store on its own, for `sweep` and `clear`.
    ///
    /// Signing settings are not read. Returns `None` when no device store is
    /// configured or it cannot be opened.
    ///
    /// # Errors
    /// Returns error if the key prefix is empty.
    pub async fn open_store(
        config: &MediaConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Option<DeviceStore>, StartupError> {
        if config.cache.key_prefix.is_empty() {
            return Err(InvalidConfig::KeyPrefix.into());
        }
        Ok(open_device_store(config, clock).await)
    }

    /// Shared resolver.
    #[must_use]
    pub fn resolver(&self) -> &MediaResolver {
        &self.resolver
    }

    /// Shared preloader.
    #[must_use]
    pub fn preloader(&self) -> &Preloader {
        &self.preloader
    }

    /// Capability of the device store, or `None` when running on memory only.
    #[must_use]
    pub fn capability(&self) -> Option<StoreCapability> {
        self.resolver.device().map(DeviceStore::capability)
    }

    /// Expired records removed by the start-up sweep.
    #[must_use]
    pub const fn swept_at_start(&self) -> usize {
        self.swept_at_start
    }

    /// Creates a binding that probes the device store synchronously.
    #[must_use]
    pub fn sync_binding(&self, fallback: impl Into<String>) -> SyncMediaBinding {
        SyncMediaBinding::new(self.resolver.clone(), self.runtime.clone(), fallback)
    }

    /// Creates a binding that reads the device store in the background.
    #[must_use]
    pub fn async_binding(&self, fallback: impl Into<String>) -> AsyncMediaBinding {
        AsyncMediaBinding::new(self.resolver.clone(), self.runtime.clone(), fallback)
    }

    /// Removes expired device records. Returns the number removed.
    pub async fn sweep(&self) -> usize {
        match self.resolver.device() {
            Some(device) => device.sweep().await,
            None => 0,
        }
    }

    /// Removes every record this subsystem wrote, in both tiers.
    /// Returns the number of device records removed.
    pub async fn clear(&self) -> usize {
        self.resolver.memory().clear();
        match self.resolver.device() {
            Some(device) => device.clear().await,
            None => 0,
        }
    }

    /// Memory store statistics.
    #[must_use]
    pub fn memory_stats(&self) -> CacheStats {
        self.resolver.memory().stats()
    }
}

async fn open_device_store(config: &MediaConfig, clock: Arc<dyn Clock>) -> Option<DeviceStore> {
    let path = config.effective_store_path();
    let prefix = config.cache.key_prefix.clone();
    let max_bytes = config.cache.max_bytes;

    let store = match config.cache.backend {
        BackendKind::None => {
            debug!("No device store configured, using process memory only");
            return None;
        }
        BackendKind::File => JsonFileBackend::open(path.clone(), max_bytes).map(|backend| {
            DeviceStore::Sync(Arc::new(SyncDeviceStore::new(
                Arc::new(backend),
                prefix,
                clock,
            )))
        }),
        BackendKind::Directory => DirectoryBackend::open(path.clone(), max_bytes)
            .await
            .map(|backend| {
                DeviceStore::Async(Arc::new(AsyncDeviceStore::new(
                    Arc::new(backend),
                    prefix,
                    clock,
                )))
            }),
    };

    match store {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Device store unavailable, using process memory only");
            None
        }
    }
}
