mod clock_port;
mod key_value_port;
mod signing_port;
mod transform_port;

pub use clock_port::{Clock, SystemClock};
pub use key_value_port::{AsyncKeyValueBackend, SyncKeyValueBackend};
pub use signing_port::SigningPort;
pub use transform_port::{TransformParams, TransformUrlBuilder};
