//! Cache configuration.
//!
//! Controls the listing cache via the `[cache]` section of `storefront.toml`.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECONDS: u64 = 60;

/// Key-value backend holding versions and cached listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

impl CacheBackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheBackendKind::Redis => "redis",
            CacheBackendKind::Memory => "memory",
        }
    }
}

/// Resolved cache configuration.
///
/// `Default` targets the in-process store so tests and local runs need no
/// Redis; deployments select the backend through settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Read and write cached listings at all.
    pub enabled: bool,
    /// Lifetime of each cached listing.
    pub ttl: Duration,
    pub backend: CacheBackendKind,
    /// Connection URL, required for the Redis backend.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            backend: CacheBackendKind::Memory,
            redis_url: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
