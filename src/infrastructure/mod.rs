//! Infrastructure layer with external service adapters.

/// Subsystem configuration.
pub mod config;
/// Delivery URL handling (memory cache, transform URLs).
pub mod image;
/// Signing endpoint client.
pub mod signing;
/// Persistent device store.
pub mod storage;

pub use config::{CliArgs, LogLevel, MediaConfig, StorageManager};
pub use image::{MemoryUrlCache, QueryTransformBuilder};
pub use signing::HttpSigningClient;
pub use storage::{DeviceStore, DirectoryBackend, JsonFileBackend};
