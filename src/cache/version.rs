//! Per-family version counters.
//!
//! Every cached listing key embeds the family's current version, so bumping
//! the counter orphans all previously written entries at once. Orphans are
//! never deleted; they age out through their TTL.

use std::sync::Arc;

use super::error::CacheError;
use super::keys::{ResourceFamily, version_key};
use super::store::KeyValueStore;

/// Version reported for a family that was never bumped.
pub const INITIAL_VERSION: u64 = 1;

#[derive(Clone)]
pub struct VersionStore {
    store: Arc<dyn KeyValueStore>,
}

impl VersionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Current version of `family`, [`INITIAL_VERSION`] when unset.
    pub async fn get_version(&self, family: ResourceFamily) -> Result<u64, CacheError> {
        let key = version_key(family);
        match self.store.get(&key).await? {
            None => Ok(INITIAL_VERSION),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| CacheError::CorruptVersion { key, value: raw }),
        }
    }

    /// Advances the version of `family` and returns the new value.
    ///
    /// Atomic in the backing store: concurrent bumps each observe a distinct
    /// result, and the first bump of an unset family yields
    /// `INITIAL_VERSION + 1`.
    pub async fn bump_version(&self, family: ResourceFamily) -> Result<u64, CacheError> {
        let key = version_key(family);
        let next = self.store.increment(&key, INITIAL_VERSION as i64).await?;
        u64::try_from(next).map_err(|_| CacheError::CorruptVersion {
            key,
            value: next.to_string(),
        })
    }
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore")
            .field("backend", &self.store.backend())
            .finish()
    }
}
