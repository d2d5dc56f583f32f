//! Transform-URL builder port definition.

use crate::domain::entities::{ImageFormat, NormalizedTransform};

/// The four transform axes plus the cache hint sent to the image service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformParams {
    /// Target width.
    pub width: Option<u32>,
    /// Target height.
    pub height: Option<u32>,
    /// Quality in 1-100.
    pub quality: u8,
    /// Output format.
    pub format: ImageFormat,
    /// Ask the image service to cache the rendition.
    pub cache: bool,
}

impl From<NormalizedTransform> for TransformParams {
    fn from(t: NormalizedTransform) -> Self {
        Self {
            width: t.width,
            height: t.height,
            quality: t.quality,
            format: t.format,
            cache: true,
        }
    }
}

/// Turns a signed raw URL into a delivery URL. Pure, no I/O.
pub trait TransformUrlBuilder: Send + Sync {
    /// Applies `params` to `raw_url`.
    fn build(&self, raw_url: &str, params: &TransformParams) -> String;
}
