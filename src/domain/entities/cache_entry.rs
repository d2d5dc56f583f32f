//! Cached delivery URLs and the lifetimes they are derived from.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default signed grant lifetime requested from the signing endpoint.
pub const DEFAULT_GRANT_TTL: Duration = Duration::seconds(3600);

/// Time subtracted from the grant lifetime before an entry expires.
pub const DEFAULT_SAFETY_BUFFER: Duration = Duration::seconds(300);

/// Default lifetime of a stored entry (grant TTL minus safety buffer).
pub const DEFAULT_ENTRY_TTL: Duration = Duration::seconds(3300);

/// A delivery URL and the instant after which it must not be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Transformed delivery URL.
    pub url: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(url: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            expires_at,
        }
    }

    /// Creates an entry that expires `ttl` after `now`.
    #[must_use]
    pub fn expiring_in(url: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self::new(url, now + ttl)
    }

    /// An entry is valid strictly before its expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Time-limited raw URL issued by the signing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedGrant {
    /// Signed, untransformed URL.
    pub raw_url: String,
    /// When the grant was requested.
    pub issued_at: DateTime<Utc>,
    /// Lifetime requested for the grant.
    pub ttl: Duration,
}

/// Rejected TTL configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("safety buffer ({buffer_secs}s) must be shorter than the grant TTL ({ttl_secs}s)")]
pub struct InvalidTtlPolicy {
    /// Grant TTL in seconds.
    pub ttl_secs: i64,
    /// Safety buffer in seconds.
    pub buffer_secs: i64,
}

/// Grant lifetime and the safety buffer applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    grant_ttl: Duration,
    safety_buffer: Duration,
}

impl TtlPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    /// Returns an error unless `0 <= safety_buffer < grant_ttl`.
    pub fn new(grant_ttl: Duration, safety_buffer: Duration) -> Result<Self, InvalidTtlPolicy> {
        if safety_buffer < Duration::zero() || safety_buffer >= grant_ttl {
            return Err(InvalidTtlPolicy {
                ttl_secs: grant_ttl.num_seconds(),
                buffer_secs: safety_buffer.num_seconds(),
            });
        }
        Ok(Self {
            grant_ttl,
            safety_buffer,
        })
    }

    /// Creates a policy from whole seconds.
    ///
    /// # Errors
    /// Returns an error unless `safety_buffer_secs < grant_ttl_secs`.
    pub fn from_secs(grant_ttl_secs: u32, safety_buffer_secs: u32) -> Result<Self, InvalidTtlPolicy> {
        Self::new(
            Duration::seconds(i64::from(grant_ttl_secs)),
            Duration::seconds(i64::from(safety_buffer_secs)),
        )
    }

    /// Lifetime requested from the signing endpoint.
    #[must_use]
    pub const fn grant_ttl(&self) -> Duration {
        self.grant_ttl
    }

    /// Safety buffer.
    #[must_use]
    pub const fn safety_buffer(&self) -> Duration {
        self.safety_buffer
    }

    /// Lifetime of an entry written right now.
    #[must_use]
    pub fn entry_ttl(&self) -> Duration {
        self.grant_ttl - self.safety_buffer
    }

    /// Expiry for an entry derived from a grant issued at `issued_at`.
    #[must_use]
    pub fn entry_expiry(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + self.entry_ttl()
    }

    /// Builds the cache entry for a grant and its transformed URL.
    #[must_use]
    pub fn entry_for(&self, grant: &SignedGrant, url: impl Into<String>) -> CacheEntry {
        CacheEntry::new(url, grant.issued_at + grant.ttl - self.safety_buffer)
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            grant_ttl: DEFAULT_GRANT_TTL,
            safety_buffer: DEFAULT_SAFETY_BUFFER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_valid_strictly_before_expiry() {
        let now = Utc::now();
        let entry = CacheEntry::new("https://cdn/x.png", now);
        assert!(!entry.is_valid_at(now));
        assert!(entry.is_valid_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_default_policy_matches_entry_ttl() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.entry_ttl(), DEFAULT_ENTRY_TTL);
    }

    #[test]
    fn test_buffer_must_be_shorter_than_ttl() {
        assert!(TtlPolicy::from_secs(300, 300).is_err());
        assert!(TtlPolicy::from_secs(60, 300).is_err());
        assert!(TtlPolicy::from_secs(3600, 0).is_ok());
    }

    #[test]
    fn test_entry_expires_before_grant() {
        let policy = TtlPolicy::default();
        let issued_at = Utc::now();
        let grant = SignedGrant {
            raw_url: "https://cdn/raw/u1.png?sig=X".to_string(),
            issued_at,
            ttl: policy.grant_ttl(),
        };
        let entry = policy.entry_for(&grant, "https://cdn/u1.webp");
        assert!(entry.expires_at < issued_at + grant.ttl);
        assert_eq!(entry.expires_at, issued_at + Duration::seconds(3300));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = CacheEntry::new("u", DateTime::<Utc>::UNIX_EPOCH);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("expiresAt"));
    }
}
