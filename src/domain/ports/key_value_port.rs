//! Port definitions for durable key/value backends.
//!
//! Device backends differ in shape: some answer immediately, others only
//! through a future. Both are string-keyed and string-valued; expiry and
//! namespacing are layered on top by the persistent device store.

use async_trait::async_trait;

use crate::domain::errors::StoreResult;

/// Backend whose operations complete without suspension.
pub trait SyncKeyValueBackend: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns error if the backend is full or cannot be written.
    fn write(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes a value. Missing keys are not an error.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Lists every key in the backend.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn keys(&self) -> StoreResult<Vec<String>>;
}

/// Backend whose operations must be awaited.
#[async_trait]
pub trait AsyncKeyValueBackend: Send + Sync {
    /// Reads a value.
    async fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a value, replacing any previous one.
    async fn write(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes a value. Missing keys are not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Lists every key in the backend.
    async fn keys(&self) -> StoreResult<Vec<String>>;
}
