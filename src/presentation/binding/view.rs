use crate::domain::entities::MediaStatus;
use crate::domain::errors::MediaError;

/// What rendering code reads from a media binding.
///
/// `url` is always renderable: the delivery URL once resolved, the fallback
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaView {
    /// URL to render.
    pub url: String,
    /// True while a resolution is in flight.
    pub is_loading: bool,
    /// Why resolution failed. Diagnostics only.
    pub error: Option<MediaError>,
    /// Binding status.
    pub status: MediaStatus,
}

impl MediaView {
    pub(crate) fn empty(fallback: &str) -> Self {
        Self::with_status(fallback, MediaStatus::Empty, None)
    }

    pub(crate) fn pending(fallback: &str) -> Self {
        Self::with_status(fallback, MediaStatus::Pending, None)
    }

    pub(crate) fn resolved(url: String) -> Self {
        Self {
            url,
            is_loading: false,
            error: None,
            status: MediaStatus::Resolved,
        }
    }

    pub(crate) fn failed(fallback: &str, error: MediaError) -> Self {
        Self::with_status(fallback, MediaStatus::Failed, Some(error))
    }

    fn with_status(fallback: &str, status: MediaStatus, error: Option<MediaError>) -> Self {
        Self {
            url: fallback.to_string(),
            is_loading: status.is_loading(),
            error,
            status,
        }
    }
}
