//! Domain types describing a media reference and the rendition requested for it.

use serde::{Deserialize, Serialize};

/// Default transform quality.
pub const DEFAULT_QUALITY: u8 = 50;

/// Lowest accepted transform quality.
pub const MIN_QUALITY: u8 = 1;

/// Highest accepted transform quality.
pub const MAX_QUALITY: u8 = 100;

/// A file picked locally that has not been uploaded yet.
/// It has no storage path, so it can never be signed or cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    /// Original file name.
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
}

impl PendingUpload {
    /// Creates a pending upload handle.
    #[must_use]
    pub fn new(file_name: impl Into<String>, size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            size,
        }
    }
}

/// What rendering code hands to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MediaReference {
    /// A raw storage path such as `avatars/u1.png`.
    Path(String),
    /// An in-memory file still waiting for upload.
    Pending(PendingUpload),
    /// Nothing to show.
    #[default]
    Absent,
}

impl MediaReference {
    /// Creates a path reference. Blank paths become [`MediaReference::Absent`].
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        let path = path.into();
        if path.trim().is_empty() {
            Self::Absent
        } else {
            Self::Path(path)
        }
    }

    /// Returns the storage path when this reference is cacheable.
    #[must_use]
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path.as_str()),
            Self::Pending(_) | Self::Absent => None,
        }
    }

    /// Returns true for references that have no storage path.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !matches!(self, Self::Path(_))
    }
}

impl From<&str> for MediaReference {
    fn from(s: &str) -> Self {
        Self::path(s)
    }
}

impl From<String> for MediaReference {
    fn from(s: String) -> Self {
        Self::path(s)
    }
}

impl From<Option<String>> for MediaReference {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::Absent, Self::path)
    }
}

impl From<PendingUpload> for MediaReference {
    fn from(upload: PendingUpload) -> Self {
        Self::Pending(upload)
    }
}

/// Output encoding requested from the transform service.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// WebP (default).
    #[default]
    Webp,
    /// JPEG.
    Jpg,
    /// PNG.
    Png,
}

impl ImageFormat {
    /// Returns the value used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendition requested for a media reference.
///
/// `None` fields take their default during [`TransformOptions::normalized`];
/// two options are equivalent when their normalized forms are equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Quality 1-100, default 50.
    pub quality: Option<u8>,
    /// Output format, default webp.
    pub format: Option<ImageFormat>,
    /// Target width in pixels.
    pub width: Option<u32>,
    /// Target height in pixels.
    pub height: Option<u32>,
}

impl TransformOptions {
    /// Creates options with every field unset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            quality: None,
            format: None,
            width: None,
            height: None,
        }
    }

    /// Square rendition used for avatars.
    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self::new().with_size(size, size)
    }

    /// Sets the quality.
    #[must_use]
    pub const fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the target width.
    #[must_use]
    pub const fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the target height.
    #[must_use]
    pub const fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Sets both dimensions.
    #[must_use]
    pub const fn with_size(self, width: u32, height: u32) -> Self {
        self.with_width(width).with_height(height)
    }

    /// Applies defaults and clamps quality into range.
    ///
    /// This is the only defaulting rule; cache keys and transform URLs are
    /// both derived from its output.
    #[must_use]
    pub fn normalized(&self) -> NormalizedTransform {
        NormalizedTransform {
            quality: self
                .quality
                .unwrap_or(DEFAULT_QUALITY)
                .clamp(MIN_QUALITY, MAX_QUALITY),
            format: self.format.unwrap_or_default(),
            width: self.width,
            height: self.height,
        }
    }

    /// Returns true when both options describe the same rendition.
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

/// [`TransformOptions`] after defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NormalizedTransform {
    /// Quality in 1-100.
    pub quality: u8,
    /// Output format.
    pub format: ImageFormat,
    /// Target width, if any.
    pub width: Option<u32>,
    /// Target height, if any.
    pub height: Option<u32>,
}

/// Status of a media binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaStatus {
    /// No reference was given; the fallback is shown.
    #[default]
    Empty,
    /// Resolution is in flight.
    Pending,
    /// A delivery URL is available.
    Resolved,
    /// Resolution failed; the fallback is shown.
    Failed,
}

impl MediaStatus {
    /// Returns true while resolution is in flight.
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns true once a delivery URL is available.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Returns true if no further transition will happen for this identity.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !self.is_loading()
    }
}

/// Where a delivery URL was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSource {
    /// Process memory store.
    MemoryCache,
    /// Persistent device store.
    DeviceStore,
    /// Freshly signed by the signing endpoint.
    Signing,
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DeviceStore => write!(f, "device"),
            Self::Signing => write!(f, "signing"),
        }
    }
}
