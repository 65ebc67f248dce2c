//! Key-value store abstraction behind the listing cache.
//!
//! Versions and cached listings live in the same store. The production
//! backend is Redis (see `infra::cache`); [`MemoryStore`] serves tests and
//! single-process deployments.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Number of writes between sweeps of expired entries.
const SWEEP_INTERVAL: u64 = 256;

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache store rejected the command: {0}")]
    Rejected(String),
    #[error("value under `{key}` is not an integer counter")]
    NotACounter { key: String },
}

/// Minimal command set the cache relies on.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheStoreError>;

    /// Atomically initializes `key` to `seed` when absent, then increments it
    /// by one and returns the new value.
    async fn increment(&self, key: &str, seed: i64) -> Result<i64, CacheStoreError>;

    async fn ping(&self) -> Result<(), CacheStoreError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process store with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` holds a live value.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Number of stored values, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL == 0 {
            let now = Instant::now();
            self.entries.retain(|_, entry| !entry.is_expired(now));
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let entry = StoredValue {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.to_string(), entry);
        self.record_write();
        Ok(())
    }

    async fn increment(&self, key: &str, seed: i64) -> Result<i64, CacheStoreError> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| StoredValue {
                value: seed.to_string(),
                expires_at: None,
            });

        if entry.is_expired(now) {
            *entry = StoredValue {
                value: seed.to_string(),
                expires_at: None,
            };
        }

        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| CacheStoreError::NotACounter {
                key: key.to_string(),
            })?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| CacheStoreError::NotACounter {
                key: key.to_string(),
            })?;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn ping(&self) -> Result<(), CacheStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_stored_value() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v".to_string(), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.contains_key("k"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn increment_seeds_absent_counter() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("counter", 1).await.unwrap(), 2);
        assert_eq!(store.increment("counter", 1).await.unwrap(), 3);
        assert_eq!(store.get("counter").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn increment_rejects_non_numeric_value() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("counter", "abc".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let err = store.increment("counter", 1).await.unwrap_err();
        assert!(matches!(err, CacheStoreError::NotACounter { .. }));
    }

    #[tokio::test]
    async fn writes_sweep_expired_entries() {
        let store = MemoryStore::new();
        for idx in 0..10 {
            store
                .set_with_ttl(&format!("old-{idx}"), "v".into(), Duration::from_millis(1))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        for idx in 0..SWEEP_INTERVAL {
            store
                .set_with_ttl(&format!("new-{idx}"), "v".into(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert!(!store.contains_key("old-0"));
        assert!(store.len() <= SWEEP_INTERVAL as usize);
    }
}
