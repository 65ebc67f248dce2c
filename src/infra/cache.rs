//! Cache store adapters selected from configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ErrorKind, RedisError};
use tracing::info;

use crate::cache::{CacheBackendKind, CacheConfig, CacheStoreError, KeyValueStore, MemoryStore};

use super::error::InfraError;

/// Redis-backed store shared by every worker of the service.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, CacheStoreError> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self { connection })
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn backend(&self) -> &'static str {
        CacheBackendKind::Redis.as_str()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(map_redis_error)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(map_redis_error)
    }

    async fn increment(&self, key: &str, seed: i64) -> Result<i64, CacheStoreError> {
        let mut conn = self.connection.clone();
        let (value,): (i64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(seed)
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|err| {
                if is_not_a_counter(&err) {
                    CacheStoreError::NotACounter {
                        key: key.to_string(),
                    }
                } else {
                    map_redis_error(err)
                }
            })?;
        Ok(value)
    }

    async fn ping(&self) -> Result<(), CacheStoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}

fn map_redis_error(err: RedisError) -> CacheStoreError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        CacheStoreError::Unavailable(err.to_string())
    } else {
        CacheStoreError::Rejected(err.to_string())
    }
}

/// `INCR` on a non-numeric value. The server error surfaces through the
/// `EXEC` reply, so it is matched on its kind and detail.
fn is_not_a_counter(err: &RedisError) -> bool {
    err.kind() == ErrorKind::ResponseError
        && err
            .detail()
            .is_some_and(|detail| detail.contains("not an integer"))
}

/// Opens the configured store. A disabled cache never connects.
pub async fn connect_store(
    config: &CacheConfig,
) -> Result<Option<Arc<dyn KeyValueStore>>, InfraError> {
    if !config.is_enabled() {
        info!(
            target = "storefront::infra::cache",
            "Listing cache disabled; no store connected"
        );
        return Ok(None);
    }

    let store: Arc<dyn KeyValueStore> = match config.backend {
        CacheBackendKind::Memory => Arc::new(MemoryStore::new()),
        CacheBackendKind::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                InfraError::configuration("cache.redis_url is required for the redis backend")
            })?;
            let store = RedisStore::connect(url).await?;
            store.ping().await?;
            Arc::new(store)
        }
    };

    info!(
        target = "storefront::infra::cache",
        backend = store.backend(),
        ttl_seconds = config.ttl.as_secs(),
        "Listing cache store connected"
    );
    Ok(Some(store))
}
