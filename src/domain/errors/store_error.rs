//! Key/value backend error types.

use thiserror::Error;

/// Failures reported by a durable key/value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend refused the write because it is full.
    #[error("store quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded {
        /// Bytes the write would need.
        needed: u64,
        /// Bytes still free.
        available: u64,
    },
    /// I/O error while accessing the backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The backend cannot be used.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for backend operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
