//! Signing endpoint port definition.

use async_trait::async_trait;
use chrono::Duration;

use crate::domain::errors::MediaResult;

/// Port for the endpoint that issues time-limited URLs for a storage path.
#[async_trait]
pub trait SigningPort: Send + Sync {
    /// Requests a signed raw URL for `file_path` valid for `expires_in`.
    ///
    /// A missing or empty signed URL is reported as an error.
    async fn sign(&self, file_path: &str, expires_in: Duration) -> MediaResult<String>;
}
