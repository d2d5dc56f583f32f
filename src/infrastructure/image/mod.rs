//! Delivery URL handling.
//!
//! This module provides:
//! - Process memory caching with LRU eviction
//! - Query-string transform URL building

pub mod memory_cache;
pub mod transform_url;

pub use memory_cache::{CacheStats, DEFAULT_MEMORY_CAPACITY, MemoryUrlCache};
pub use transform_url::{QueryTransformBuilder, build_transform_url};
