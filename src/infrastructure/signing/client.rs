//! HTTP client for the storage signing endpoint.

use async_trait::async_trait;
use chrono::Duration;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, warn};

use super::dto::{ErrorResponse, SignRequest, SignResponse};
use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::SigningPort;

const USER_AGENT: &str = concat!("optimedia/", env!("CARGO_PKG_VERSION"));

/// Signing endpoint client.
///
/// Sends `{ filePath, expiresIn }` and expects `{ signedUrl }` back. No request
/// timeout is applied unless one is configured.
pub struct HttpSigningClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSigningClient {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(endpoint: impl Into<String>) -> MediaResult<Self> {
        Self::with_options(endpoint, None, None)
    }

    /// Creates a client with an optional API key and request timeout.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn with_options(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<std::time::Duration>,
    ) -> MediaResult<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| MediaError::signing(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn handle_error_response(status: StatusCode, response: reqwest::Response) -> MediaError {
        let error_message = match response.json::<ErrorResponse>().await {
            Ok(error) => error.message,
            Err(_) => format!("HTTP {status}"),
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                MediaError::signing(format!("access denied: {error_message}"))
            }
            StatusCode::NOT_FOUND => MediaError::signing(format!("object not found: {error_message}")),
            StatusCode::TOO_MANY_REQUESTS => MediaError::signing("rate limited by signing endpoint"),
            _ => MediaError::signing(format!("unexpected response: {status} - {error_message}")),
        }
    }
}

#[async_trait]
impl SigningPort for HttpSigningClient {
    async fn sign(&self, file_path: &str, expires_in: Duration) -> MediaResult<String> {
        debug!(path = %file_path, expires_in = expires_in.num_seconds(), "Requesting signed URL");

        let mut request = self.client.post(&self.endpoint).json(&SignRequest {
            file_path,
            expires_in: expires_in.num_seconds(),
        });
        if let Some(api_key) = &self.api_key {
            request = request
                .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
                .header("apikey", api_key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Failed to reach signing endpoint");
            if e.is_timeout() {
                MediaError::signing("request timed out")
            } else if e.is_connect() {
                MediaError::signing("failed to connect to signing endpoint")
            } else {
                MediaError::signing(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::handle_error_response(status, response).await);
        }

        let body: SignResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse signing response");
            MediaError::signing(format!("failed to parse response: {e}"))
        })?;

        body.signed_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| MediaError::signing("response did not contain a signed URL"))
    }
}

impl std::fmt::Debug for HttpSigningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSigningClient")
            .field("endpoint", &self.endpoint)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}
