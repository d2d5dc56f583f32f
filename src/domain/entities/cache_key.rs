//! Cache identity for a (reference, rendition) pair.

use super::media::{NormalizedTransform, TransformOptions};

/// Deterministic identity of one rendition of one storage path.
///
/// Unset dimensions are written as an empty placeholder, never `0`, so an
/// unset width and `width = 0` produce different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key for a storage path and transform options.
    #[must_use]
    pub fn build(reference: &str, options: &TransformOptions) -> Self {
        Self::from_normalized(reference, &options.normalized())
    }

    /// Builds the key from already-normalized options.
    #[must_use]
    pub fn from_normalized(reference: &str, transform: &NormalizedTransform) -> Self {
        Self(format!(
            "{reference}|q={}|f={}|w={}|h={}",
            transform.quality,
            transform.format,
            dimension(transform.width),
            dimension(transform.height),
        ))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed-length digest of the key, safe to use as a file name.
    #[must_use]
    pub fn digest(&self) -> String {
        digest(&self.0)
    }
}

/// Hex SHA-256 prefix of an arbitrary string.
#[must_use]
pub fn digest(value: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

fn dimension(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
