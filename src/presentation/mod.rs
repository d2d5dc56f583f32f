//! Presentation layer with media bindings and the subsystem root.

/// Media bindings observed by rendering code.
pub mod binding;
/// Subsystem composition root.
pub mod subsystem;

pub use binding::{AsyncMediaBinding, MediaView, SyncMediaBinding};
pub use subsystem::{MediaSubsystem, StartupError};
