use std::time::Duration;

use async_trait::async_trait;
use fred::clients::Pool;
use fred::prelude::*;
use fred::types::{Builder, Expiration};

use crate::cache::LookupCache;
use crate::error::StorageError;

const POOL_SIZE: usize = 4;

/// [`LookupCache`] backed by Redis through a `fred` connection pool.
pub struct RedisLookupCache {
    pool: Pool,
}

impl RedisLookupCache {
    /// Connects to `redis_url` and waits for every pooled client.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Cache`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let config = Config::from_url(redis_url).map_err(cache_err)?;

        let pool = Builder::from_config(config)
            .with_connection_config(|cfg| {
                cfg.connection_timeout = Duration::from_secs(5);
                cfg.internal_command_timeout = Duration::from_secs(5);
                cfg.max_command_attempts = 3;
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 5_000, 2))
            .build_pool(POOL_SIZE)
            .map_err(cache_err)?;

        pool.init().await.map_err(cache_err)?;
        pool.wait_for_connect().await.map_err(cache_err)?;

        tracing::info!(pool_size = POOL_SIZE, "connected to redis");
        Ok(Self { pool })
    }
}

fn cache_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::Cache(err.to_string())
}

/// Whole seconds, at least one, so a sub-second TTL still expires.
fn expiration(ttl: Duration) -> Expiration {
    Expiration::EX(i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX))
}

#[async_trait]
impl LookupCache for RedisLookupCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.pool.get::<Option<String>, _>(key).await.map_err(cache_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.pool
            .set::<(), _, _>(key, value, Some(expiration(ttl)), None, false)
            .await
            .map_err(cache_err)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.pool.del::<i64, _>(key).await.map_err(cache_err)?;
        Ok(())
    }
}
