//! Application layer with the resolution services.

/// Signing, resolution and preloading services.
pub mod services;

pub use services::{MediaResolver, Preloader, ResolvedMedia, SigningTransformClient, WarmSummary};
