//! Batch warming of the resolver for above-the-fold media.

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::resolver::MediaResolver;
use crate::domain::entities::{MediaReference, TransformOptions};

/// Outcome of one warm call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmSummary {
    /// References attempted.
    pub attempted: usize,
    /// References now cached.
    pub warmed: usize,
    /// References that failed or had no storage path.
    pub failed: usize,
}

impl std::fmt::Display for WarmSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "warmed {}/{} ({} failed)",
            self.warmed, self.attempted, self.failed
        )
    }
}

/// Warms the cache tiers for the first `limit` references of a collection.
#[derive(Debug, Clone)]
pub struct Preloader {
    resolver: MediaResolver,
    limit: usize,
}

impl Preloader {
    /// Creates a preloader bounded to `limit` references per call.
    #[must_use]
    pub fn new(resolver: MediaResolver, limit: usize) -> Self {
        Self {
            resolver,
            limit: limit.max(1),
        }
    }

    /// Maximum references warmed per call.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Resolves the leading references in parallel. Never fails.
    pub async fn warm(&self, items: &[MediaReference], options: &TransformOptions) -> WarmSummary {
        let batch = &items[..items.len().min(self.limit)];
        if items.len() > batch.len() {
            debug!(skipped = items.len() - batch.len(), "Preload limit reached");
        }

        let results = join_all(
            batch
                .iter()
                .map(|reference| self.resolver.try_resolve(reference, options)),
        )
        .await;

        let mut summary = WarmSummary {
            attempted: batch.len(),
            ..WarmSummary::default()
        };
        for (reference, result) in batch.iter().zip(results) {
            match result {
                Ok(resolved) => {
                    summary.warmed += 1;
                    debug!(reference = ?reference, source = %resolved.source, "Preloaded media");
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(reference = ?reference, error = %e, "Failed to preload media");
                }
            }
        }

        info!(%summary, "Preload finished");
        summary
    }

    /// Warms square avatar renditions of `size` pixels.
    pub async fn warm_avatars(&self, paths: &[String], size: u32) -> WarmSummary {
        let references: Vec<MediaReference> = paths
            .iter()
            .take(self.limit)
            .map(|path| MediaReference::path(path.as_str()))
            .collect();
        self.warm(&references, &TransformOptions::square(size)).await
    }
}
