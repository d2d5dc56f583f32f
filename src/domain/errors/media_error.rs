//! Media resolution error types.

use thiserror::Error;

/// Why a media reference could not be turned into a delivery URL.
///
/// These stop at the resolver and binding boundaries: the resolver maps them to
/// `None` and a binding shows the fallback URL, keeping the error only for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum MediaError {
    #[error("signing failed: {message}")]
    Signing { message: String },

    #[error("signed URL is not a recognized image: {url}")]
    InvalidMedia { url: String },

    #[error("device store error: {message}")]
    Store { message: String },

    #[error("invalid media reference: {reason}")]
    Input { reason: String },
}

impl MediaError {
    /// Creates a signing error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates an invalid media error.
    #[must_use]
    pub fn invalid_media(url: impl Into<String>) -> Self {
        Self::InvalidMedia { url: url.into() }
    }

    /// Creates a store error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates an input error.
    #[must_use]
    pub fn input(reason: impl Into<String>) -> Self {
        Self::Input {
            reason: reason.into(),
        }
    }

    /// Returns true for failures reported by the signing endpoint.
    #[must_use]
    pub const fn is_signing_failure(&self) -> bool {
        matches!(self, Self::Signing { .. })
    }
}

impl From<super::StoreError> for MediaError {
    fn from(e: super::StoreError) -> Self {
        Self::store(e.to_string())
    }
}

/// Result alias for media resolution.
pub type MediaResult<T> = std::result::Result<T, MediaError>;
