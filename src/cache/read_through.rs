//! Read-through orchestration for cached listings.
//!
//! Cache-store failures never fail a request: every error on the cache path
//! is logged, counted, and handled as a miss. Only the loader's error reaches
//! the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::entries::EntryStore;
use super::error::CacheError;
use super::keys::{CacheKey, QueryDescriptor, ResourceFamily};
use super::store::KeyValueStore;
use super::version::VersionStore;

pub(crate) const METRIC_CACHE_HIT_TOTAL: &str = "storefront_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS_TOTAL: &str = "storefront_cache_miss_total";
pub(crate) const METRIC_CACHE_BYPASS_TOTAL: &str = "storefront_cache_bypass_total";
pub(crate) const METRIC_CACHE_ERROR_TOTAL: &str = "storefront_cache_error_total";

/// How a value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a cache entry.
    Hit,
    /// Loaded from the data layer, cache consulted.
    Miss,
    /// Loaded from the data layer without consulting the cache.
    Bypass,
}

impl CacheStatus {
    /// Value of the `x-cache` response header.
    pub fn header_value(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }

    pub fn is_hit(self) -> bool {
        matches!(self, CacheStatus::Hit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
}

/// Reachability of the cache store, as reported by health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHealth {
    Ok,
    Disabled,
    Unavailable,
}

impl CacheHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheHealth::Ok => "ok",
            CacheHealth::Disabled => "disabled",
            CacheHealth::Unavailable => "unavailable",
        }
    }
}

#[derive(Clone)]
struct Backend {
    versions: VersionStore,
    entries: EntryStore,
}

/// Read-through cache for one resource family.
#[derive(Clone)]
pub struct ReadThroughCache {
    family: ResourceFamily,
    ttl: Duration,
    backend: Option<Backend>,
}

impl ReadThroughCache {
    pub fn new(family: ResourceFamily, ttl: Duration, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            family,
            ttl,
            backend: Some(Backend {
                versions: VersionStore::new(store.clone()),
                entries: EntryStore::new(store),
            }),
        }
    }

    /// Cache that always bypasses to the loader.
    pub fn disabled(family: ResourceFamily) -> Self {
        Self {
            family,
            ttl: Duration::ZERO,
            backend: None,
        }
    }

    pub fn family(&self) -> ResourceFamily {
        self.family
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn health(&self) -> CacheHealth {
        let Some(backend) = &self.backend else {
            return CacheHealth::Disabled;
        };

        match backend.versions.store().ping().await {
            Ok(()) => CacheHealth::Ok,
            Err(err) => {
                warn!(
                    target = "storefront::cache",
                    backend = backend.versions.store().backend(),
                    error = %err,
                    "Cache store ping failed"
                );
                CacheHealth::Unavailable
            }
        }
    }

    /// Returns the cached value for `descriptor`, or runs `load` and caches
    /// its result.
    ///
    /// A loader error is returned as is and nothing is written.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        descriptor: &QueryDescriptor,
        load: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(backend) = &self.backend else {
            counter!(METRIC_CACHE_BYPASS_TOTAL, "family" => self.family.name()).increment(1);
            return load().await.map(|value| Cached {
                value,
                status: CacheStatus::Bypass,
            });
        };

        let version = match backend.versions.get_version(self.family).await {
            Ok(version) => version,
            Err(err) => {
                self.report("get_version", None, &err);
                counter!(METRIC_CACHE_BYPASS_TOTAL, "family" => self.family.name()).increment(1);
                return load().await.map(|value| Cached {
                    value,
                    status: CacheStatus::Bypass,
                });
            }
        };

        let key = CacheKey::for_query(self.family, version, descriptor);

        match backend.entries.get::<T>(&key).await {
            Ok(Some(value)) => {
                counter!(METRIC_CACHE_HIT_TOTAL, "family" => self.family.name()).increment(1);
                debug!(target = "storefront::cache", key = %key, "Cache hit");
                return Ok(Cached {
                    value,
                    status: CacheStatus::Hit,
                });
            }
            Ok(None) => {}
            Err(err) => self.report("get", Some(&key), &err),
        }

        counter!(METRIC_CACHE_MISS_TOTAL, "family" => self.family.name()).increment(1);
        let value = load().await?;

        match backend.entries.set(&key, &value, self.ttl).await {
            Ok(()) => debug!(
                target = "storefront::cache",
                key = %key,
                ttl_secs = self.ttl.as_secs(),
                "Cache entry stored"
            ),
            Err(err) => self.report("set", Some(&key), &err),
        }

        Ok(Cached {
            value,
            status: CacheStatus::Miss,
        })
    }

    fn report(&self, op: &'static str, key: Option<&CacheKey>, err: &CacheError) {
        counter!(METRIC_CACHE_ERROR_TOTAL, "op" => op).increment(1);
        warn!(
            target = "storefront::cache",
            family = self.family.name(),
            op,
            key = key.map(ToString::to_string),
            kind = err.kind(),
            error = %err,
            "Cache operation failed, serving from the data layer"
        );
    }
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("family", &self.family)
            .field("ttl", &self.ttl)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
