pub mod preloader;
pub mod resolver;
pub mod signing_transform;

pub use preloader::{Preloader, WarmSummary};
pub use resolver::{MediaResolver, ResolvedMedia};
pub use signing_transform::{SignedDelivery, SigningTransformClient, has_image_extension};
