use std::sync::Arc;

use async_trait::async_trait;
use pagescope_scraper::MediaClient;

use crate::blob::BlobStore;
use crate::error::StorageError;
use crate::keys::validate_key;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Copies an externally hosted asset into owned storage.
#[async_trait]
pub trait MediaOffloader: Send + Sync {
    /// Fetches `source_url`, stores it at `destination_key` and returns the
    /// stable URL. Offloading to an existing key overwrites it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the key is invalid, the fetch fails after
    /// retries, or the store rejects the write.
    async fn offload(&self, source_url: &str, destination_key: &str)
        -> Result<String, StorageError>;
}

/// [`MediaOffloader`] that downloads with a [`MediaClient`] and writes to any
/// [`BlobStore`].
pub struct BlobOffloader {
    media: MediaClient,
    store: Arc<dyn BlobStore>,
}

impl BlobOffloader {
    #[must_use]
    pub fn new(media: MediaClient, store: Arc<dyn BlobStore>) -> Self {
        Self { media, store }
    }
}

#[async_trait]
impl MediaOffloader for BlobOffloader {
    async fn offload(
        &self,
        source_url: &str,
        destination_key: &str,
    ) -> Result<String, StorageError> {
        validate_key(destination_key)?;

        let fetched = self.media.fetch(source_url).await?;
        let content_type = fetched
            .content_type
            .as_deref()
            .unwrap_or(FALLBACK_CONTENT_TYPE);
        let size = fetched.bytes.len();

        let url = self
            .store
            .put(destination_key, fetched.bytes, content_type)
            .await?;

        tracing::debug!(
            key = destination_key,
            bytes = size,
            content_type,
            "offloaded media"
        );
        Ok(url)
    }
}
