use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::CacheError;
use super::keys::CacheKey;
use super::store::KeyValueStore;

/// JSON-serialized cache entries addressed by [`CacheKey`].
#[derive(Clone)]
pub struct EntryStore {
    store: Arc<dyn KeyValueStore>,
}

impl EntryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        match self.store.get(&key.to_string()).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        self.store
            .set_with_ttl(&key.to_string(), payload, ttl)
            .await?;
        Ok(())
    }
}
