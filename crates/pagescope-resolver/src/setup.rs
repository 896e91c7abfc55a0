//! Builds a production [`Resolver`] from [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use pagescope_core::AppConfig;
use pagescope_scraper::{HttpPageSource, MediaClient, ScraperError};
use pagescope_storage::{
    BlobOffloader, BlobStore, LocalBlobStore, LookupCache, MemoryLookupCache, RedisLookupCache,
    S3BlobStore, StorageError,
};
use sqlx::PgPool;
use thiserror::Error;

use crate::acquire::{AcquireSettings, AcquisitionEngine};
use crate::resolver::Resolver;
use crate::store::PgProfileStore;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] ScraperError),

    #[error("failed to connect lookup cache: {0}")]
    Cache(#[from] StorageError),
}

/// Redis when `PAGESCOPE_REDIS_URL` is set, otherwise in-process.
///
/// # Errors
///
/// Returns [`SetupError::Cache`] if Redis is configured but unreachable.
pub async fn build_cache(config: &AppConfig) -> Result<Arc<dyn LookupCache>, SetupError> {
    if let Some(url) = &config.redis_url {
        tracing::info!("using redis lookup cache");
        return Ok(Arc::new(RedisLookupCache::connect(url).await?));
    }
    tracing::info!("PAGESCOPE_REDIS_URL not set; using in-process lookup cache");
    Ok(Arc::new(MemoryLookupCache::new()))
}

/// S3 when a bucket is configured, otherwise the local blob directory.
pub async fn build_blob_store(config: &AppConfig) -> Arc<dyn BlobStore> {
    if let Some(s3) = &config.s3 {
        tracing::info!(bucket = %s3.bucket, "using s3 blob store");
        return Arc::new(S3BlobStore::new(s3).await);
    }
    tracing::info!(dir = %config.blob_dir.display(), "using local blob store");
    Arc::new(LocalBlobStore::new(config.blob_dir.clone(), None))
}

/// Wires the HTTP page source, blob offloader, Postgres store and cache
/// into a [`Resolver`].
///
/// # Errors
///
/// Returns [`SetupError`] if an HTTP client cannot be built or the cache
/// cannot be reached.
pub async fn build_resolver(config: &AppConfig, pool: PgPool) -> Result<Resolver, SetupError> {
    let source = Arc::new(HttpPageSource::from_app_config(config)?);
    let offloader = Arc::new(BlobOffloader::new(
        MediaClient::from_app_config(config)?,
        build_blob_store(config).await,
    ));
    let store = Arc::new(PgProfileStore::new(pool));
    let engine = AcquisitionEngine::new(
        source,
        offloader,
        store.clone(),
        AcquireSettings::from_app_config(config),
    );

    Ok(Resolver::new(
        build_cache(config).await?,
        store,
        engine,
        Duration::from_secs(config.cache_ttl_secs),
    ))
}
