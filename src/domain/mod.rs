//! Domain layer with core media entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheEntry, CacheKey, MediaReference, TransformOptions};
pub use errors::{MediaError, StoreError};
pub use ports::{Clock, SigningPort, TransformUrlBuilder};
