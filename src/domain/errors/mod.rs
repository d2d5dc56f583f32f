//! Domain error types.

mod media_error;
mod store_error;

pub use media_error::{MediaError, MediaResult};
pub use store_error::{StoreError, StoreResult};
