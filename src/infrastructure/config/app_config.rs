//! Subsystem configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use super::args::CliArgs;
use crate::domain::entities::{InvalidTtlPolicy, TtlPolicy};
use crate::infrastructure::storage::{DEFAULT_KEY_PREFIX, DEFAULT_MAX_BYTES};

const APP_NAME: &str = "optimedia";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Default number of references warmed by the preloader.
pub const DEFAULT_PRELOAD_LIMIT: usize = 6;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Durable backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Synchronous JSON file store.
    #[default]
    File,
    /// Asynchronous one-file-per-key store.
    Directory,
    /// No durable tier; process memory only.
    None,
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum InvalidConfig {
    /// TTL and safety buffer are inconsistent.
    #[error(transparent)]
    Ttl(#[from] InvalidTtlPolicy),
    /// Preload limit of zero.
    #[error("preload limit must be at least 1")]
    PreloadLimit,
    /// Empty key prefix.
    #[error("cache key prefix must not be empty")]
    KeyPrefix,
    /// Missing signing endpoint.
    #[error("signing endpoint is not configured")]
    MissingEndpoint,
}

/// Subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MediaConfig {
    /// Log file path.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Signing endpoint settings.
    #[serde(default)]
    pub signing: SigningConfig,

    /// Cache tier settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Preloader settings.
    #[serde(default)]
    pub preload: PreloadConfig,
}

/// Signing endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// URL of the signing endpoint.
    #[serde(default)]
    pub endpoint: String,

    /// API key sent with signing requests.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Lifetime requested for signed grants.
    #[serde(default = "default_grant_ttl_secs")]
    pub grant_ttl_secs: u32,

    /// Time subtracted from the grant lifetime for cache entries.
    #[serde(default = "default_safety_buffer_secs")]
    pub safety_buffer_secs: u32,

    /// Request timeout. Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            grant_ttl_secs: default_grant_ttl_secs(),
            safety_buffer_secs: default_safety_buffer_secs(),
            timeout_secs: None,
        }
    }
}

/// Cache tier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Prefix for every durable key this subsystem writes.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Maximum keys held in process memory.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Durable backend.
    #[serde(default)]
    pub backend: BackendKind,

    /// Location of the durable store.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Durable store quota in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Share one in-flight signing call between concurrent identical requests.
    #[serde(default)]
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            memory_capacity: default_memory_capacity(),
            backend: BackendKind::default(),
            path: None,
            max_bytes: default_max_bytes(),
            single_flight: false,
        }
    }
}

/// Preloader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Number of leading references warmed per call.
    #[serde(default = "default_preload_limit")]
    pub limit: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            limit: default_preload_limit(),
        }
    }
}

fn default_grant_ttl_secs() -> u32 {
    3600
}

fn default_safety_buffer_secs() -> u32 {
    300
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_memory_capacity() -> usize {
    500
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_preload_limit() -> usize {
    DEFAULT_PRELOAD_LIMIT
}

impl MediaConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(endpoint) = &args.endpoint {
            self.signing.endpoint.clone_from(endpoint);
        }
        if let Some(api_key) = &args.api_key {
            self.signing.api_key = Some(api_key.clone());
        }
        if let Some(backend) = args.backend {
            self.cache.backend = backend;
        }
        if let Some(store_path) = &args.store_path {
            self.cache.path = Some(store_path.clone());
        }
        if args.single_flight {
            self.cache.single_flight = true;
        }
    }

    /// Checks values that cannot be expressed in the types.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        self.ttl_policy()?;
        if self.preload.limit == 0 {
            return Err(InvalidConfig::PreloadLimit);
        }
        if self.cache.key_prefix.is_empty() {
            return Err(InvalidConfig::KeyPrefix);
        }
        if self.signing.endpoint.trim().is_empty() {
            return Err(InvalidConfig::MissingEndpoint);
        }
        Ok(())
    }

    /// Builds the TTL policy.
    ///
    /// # Errors
    /// Returns error if the safety buffer is not shorter than the grant TTL.
    pub fn ttl_policy(&self) -> Result<TtlPolicy, InvalidTtlPolicy> {
        TtlPolicy::from_secs(self.signing.grant_ttl_secs, self.signing.safety_buffer_secs)
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("optimedia.log"))
    }

    /// Returns the default durable store location for a backend.
    #[must_use]
    pub fn default_store_path(backend: BackendKind) -> PathBuf {
        let base = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
            || std::env::temp_dir().join(APP_NAME).join("cache"),
            |dirs| dirs.cache_dir().to_path_buf(),
        );
        match backend {
            BackendKind::Directory => base.join("entries"),
            BackendKind::File | BackendKind::None => base.join("media-urls.json"),
        }
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }

    /// Returns effective durable store location.
    #[must_use]
    pub fn effective_store_path(&self) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| Self::default_store_path(self.cache.backend))
    }
}
