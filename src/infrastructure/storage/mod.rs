//! Persistent device store and its backends.

mod device_store;
mod directory_backend;
mod json_file_backend;

pub use device_store::{
    AsyncDeviceStore, DEFAULT_KEY_PREFIX, DEFAULT_MAX_BYTES, DeviceStore, StoreCapability,
    SyncDeviceStore,
};
pub use directory_backend::DirectoryBackend;
pub use json_file_backend::JsonFileBackend;
