//! Version-tagged read-through cache for product listings.
//!
//! A listing is stored under `<family>:v<version>:<fingerprint>`. Mutations
//! bump the family version instead of deleting entries, so stale listings
//! become unreachable at once and expire through their TTL.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 60
//! backend = "redis"   # or "memory"
//! redis_url = "redis://127.0.0.1:6379"
//! ```

mod config;
mod entries;
mod error;
mod keys;
mod read_through;
mod store;
mod trigger;
mod version;

use std::sync::Arc;

pub use config::{CacheBackendKind, CacheConfig};
pub use entries::EntryStore;
pub use error::CacheError;
pub use keys::{CacheKey, QueryDescriptor, ResourceFamily, fingerprint, version_key};
pub use read_through::{CacheHealth, CacheStatus, Cached, ReadThroughCache};
pub use store::{CacheStoreError, KeyValueStore, MemoryStore};
pub use trigger::CacheInvalidator;
pub use version::{INITIAL_VERSION, VersionStore};

/// Read and invalidation handles for one resource family.
#[derive(Clone, Debug)]
pub struct FamilyCache {
    reader: ReadThroughCache,
    invalidator: CacheInvalidator,
}

impl FamilyCache {
    /// Builds the cache from settings. A missing store or a disabled config
    /// yields a cache that bypasses reads and skips invalidation.
    pub fn new(
        family: ResourceFamily,
        config: &CacheConfig,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        match store {
            Some(store) if config.is_enabled() => Self {
                reader: ReadThroughCache::new(family, config.ttl, store.clone()),
                invalidator: CacheInvalidator::new(family, VersionStore::new(store)),
            },
            _ => Self::disabled(family),
        }
    }

    pub fn disabled(family: ResourceFamily) -> Self {
        Self {
            reader: ReadThroughCache::disabled(family),
            invalidator: CacheInvalidator::disabled(family),
        }
    }

    pub fn reader(&self) -> &ReadThroughCache {
        &self.reader
    }

    pub fn invalidator(&self) -> &CacheInvalidator {
        &self.invalidator
    }
}
