//! Cache invalidation trigger.
//!
//! Write paths call [`CacheInvalidator::mutation_committed`] once their
//! transaction has committed. Bumping the family version makes every listing
//! cached under the previous version unreachable.

use metrics::counter;
use tracing::{debug, error, info};

use super::keys::ResourceFamily;
use super::read_through::METRIC_CACHE_ERROR_TOTAL;
use super::version::VersionStore;

pub(crate) const METRIC_CACHE_VERSION_BUMP_TOTAL: &str = "storefront_cache_version_bump_total";

#[derive(Clone, Debug)]
pub struct CacheInvalidator {
    family: ResourceFamily,
    versions: Option<VersionStore>,
}

impl CacheInvalidator {
    pub fn new(family: ResourceFamily, versions: VersionStore) -> Self {
        Self {
            family,
            versions: Some(versions),
        }
    }

    pub fn disabled(family: ResourceFamily) -> Self {
        Self {
            family,
            versions: None,
        }
    }

    /// Bumps the family version after a committed mutation.
    ///
    /// Returns the new version, or `None` when the cache is disabled or the
    /// bump failed. A failure is logged and counted but never returned: the
    /// mutation itself already succeeded.
    pub async fn mutation_committed(&self, mutation: &'static str) -> Option<u64> {
        let Some(versions) = &self.versions else {
            debug!(
                target = "storefront::cache",
                family = self.family.name(),
                mutation,
                "Cache invalidation skipped: cache disabled"
            );
            return None;
        };

        match versions.bump_version(self.family).await {
            Ok(version) => {
                counter!(METRIC_CACHE_VERSION_BUMP_TOTAL, "family" => self.family.name())
                    .increment(1);
                info!(
                    target = "storefront::cache",
                    family = self.family.name(),
                    mutation,
                    version,
                    "Cache version bumped"
                );
                Some(version)
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "bump_version").increment(1);
                error!(
                    target = "storefront::cache",
                    family = self.family.name(),
                    mutation,
                    kind = err.kind(),
                    error = %err,
                    "Cache version bump failed; listings may stay stale until their TTL expires"
                );
                None
            }
        }
    }
}
