//! Optimedia - short-lived signed media URLs behind a tiered cache.
//!
//! This crate turns stored image references into transformed, time-limited
//! delivery URLs and caches them in process memory and a per-device store so
//! repeated renders do not re-sign.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the resolution services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;
/// Presentation layer containing media bindings and the subsystem root.
pub mod presentation;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "optimedia";
