//! Subsystem configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{
    BackendKind, CacheConfig, DEFAULT_PRELOAD_LIMIT, InvalidConfig, LogLevel, MediaConfig,
    PreloadConfig, SigningConfig,
};
pub use args::{CliArgs, Command};
pub use storage::{ConfigError, StorageManager};
