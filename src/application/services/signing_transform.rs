//! Turns a storage path into a transformed, time-limited delivery URL.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::entities::{CacheEntry, SignedGrant, TransformOptions, TtlPolicy};
use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::{Clock, SigningPort, TransformParams, TransformUrlBuilder};

/// Result of a successful slow-path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDelivery {
    /// Grant returned by the signing endpoint.
    pub grant: SignedGrant,
    /// Cache entry for the transformed URL, expiring before the grant does.
    pub entry: CacheEntry,
}

impl SignedDelivery {
    /// Transformed delivery URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.entry.url
    }
}

/// Returns true if the URL path ends in a recognized image extension.
#[must_use]
pub fn has_image_extension(url: &str) -> bool {
    static IMAGE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\.(?:png|jpe?g|gif|webp|avif)$").expect("Invalid regex")
    });

    let path = url.split(['?', '#']).next().unwrap_or_default();
    IMAGE_PATH_RE.is_match(path)
}

/// Signs a storage path and applies transform options to the result.
pub struct SigningTransformClient {
    signer: Arc<dyn SigningPort>,
    transformer: Arc<dyn TransformUrlBuilder>,
    clock: Arc<dyn Clock>,
    policy: TtlPolicy,
}

impl SigningTransformClient {
    /// Creates the client.
    #[must_use]
    pub fn new(
        signer: Arc<dyn SigningPort>,
        transformer: Arc<dyn TransformUrlBuilder>,
        clock: Arc<dyn Clock>,
        policy: TtlPolicy,
    ) -> Self {
        Self {
            signer,
            transformer,
            clock,
            policy,
        }
    }

    /// TTL policy applied to grants and entries.
    #[must_use]
    pub const fn policy(&self) -> TtlPolicy {
        self.policy
    }

    /// Requests a grant, validates it and builds the delivery URL.
    ///
    /// Issuance time is taken before the request is sent, so the entry expiry
    /// never outlives the grant.
    ///
    /// # Errors
    /// Returns [`MediaError::Signing`] if the endpoint fails and
    /// [`MediaError::InvalidMedia`] if the signed URL is not an image.
    pub async fn resolve(
        &self,
        reference: &str,
        options: &TransformOptions,
    ) -> MediaResult<SignedDelivery> {
        let issued_at = self.clock.now();
        let raw_url = self.signer.sign(reference, self.policy.grant_ttl()).await?;

        if !has_image_extension(&raw_url) {
            warn!(path = %reference, "Signed URL has no recognized image extension");
            return Err(MediaError::invalid_media(raw_url));
        }

        let params = TransformParams::from(options.normalized());
        let url = self.transformer.build(&raw_url, &params);

        let grant = SignedGrant {
            raw_url,
            issued_at,
            ttl: self.policy.grant_ttl(),
        };
        let entry = self.policy.entry_for(&grant, url);

        debug!(path = %reference, expires_at = %entry.expires_at, "Signed and transformed media URL");

        Ok(SignedDelivery { grant, entry })
    }
}

impl std::fmt::Debug for SigningTransformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningTransformClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_case::test_case;

    use crate::domain::ports::mocks::{ManualClock, MockSigningPort};
    use crate::infrastructure::image::QueryTransformBuilder;

    fn client(signer: Arc<MockSigningPort>, clock: Arc<ManualClock>) -> SigningTransformClient {
        SigningTransformClient::new(
            signer,
            Arc::new(QueryTransformBuilder::new()),
            clock,
            TtlPolicy::default(),
        )
    }

    #[test_case("https://cdn/raw/u1.png?sig=X", true ; "png_with_query")]
    #[test_case("https://cdn/raw/photo.JPEG", true ; "uppercase_jpeg")]
    #[test_case("https://cdn/raw/a.webp#x", true ; "webp_with_fragment")]
    #[test_case("https://cdn/raw/doc.pdf?sig=X", false ; "pdf")]
    #[test_case("https://cdn/raw/noext?file=a.png", false ; "extension_only_in_query")]
    fn test_image_extension(url: &str, expected: bool) {
        assert_eq!(has_image_extension(url), expected);
    }

    #[tokio::test]
    async fn test_resolve_builds_transformed_url() {
        let signer = Arc::new(MockSigningPort::new());
        let clock = Arc::new(ManualClock::new());
        let client = client(signer.clone(), clock.clone());

        let delivery = client
            .resolve("avatars/u1.png", &TransformOptions::square(100))
            .await
            .unwrap();

        assert_eq!(
            delivery.url(),
            "https://cdn/raw/avatars/u1.png?sig=X&width=100&height=100&quality=50&format=webp&cache=true"
        );
        assert_eq!(signer.requested_ttls(), vec![Duration::seconds(3600)]);
        assert_eq!(
            delivery.entry.expires_at,
            clock.now() + Duration::seconds(3300)
        );
    }

    #[tokio::test]
    async fn test_entry_expires_strictly_before_grant() {
        let signer = Arc::new(MockSigningPort::new());
        let client = client(signer, Arc::new(ManualClock::new()));

        let delivery = client
            .resolve("a.png", &TransformOptions::new())
            .await
            .unwrap();

        assert!(delivery.entry.expires_at < delivery.grant.issued_at + delivery.grant.ttl);
    }

    #[tokio::test]
    async fn test_non_image_is_invalid_media() {
        let signer = Arc::new(MockSigningPort::new());
        signer.respond("doc", Ok("https://cdn/raw/doc.pdf?sig=X".to_string()));
        let client = client(signer, Arc::new(ManualClock::new()));

        let err = client
            .resolve("doc", &TransformOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia { .. }));
    }

    #[tokio::test]
    async fn test_signing_failure_reported() {
        let signer = Arc::new(MockSigningPort::new());
        signer.fail("a.png");
        let client = client(signer, Arc::new(ManualClock::new()));

        let err = client
            .resolve("a.png", &TransformOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Signing { .. }));
    }
}
