//! Domain entity definitions.

mod cache_entry;
mod cache_key;
mod media;

pub use cache_entry::{
    CacheEntry, DEFAULT_ENTRY_TTL, DEFAULT_GRANT_TTL, DEFAULT_SAFETY_BUFFER, InvalidTtlPolicy,
    SignedGrant, TtlPolicy,
};
pub use cache_key::{CacheKey, digest};
pub use media::{
    DEFAULT_QUALITY, ImageFormat, MAX_QUALITY, MIN_QUALITY, MediaReference, MediaSource,
    MediaStatus, NormalizedTransform, PendingUpload, TransformOptions,
};
