//! Durable object storage for offloaded media.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;
use crate::keys::validate_key;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `data` at `key`, overwriting any existing object, and returns
    /// the stable URL the object is reachable at.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the key is invalid or the write fails.
    async fn put(&self, key: &str, data: Bytes, content_type: &str)
        -> Result<String, StorageError>;
}

/// Joins a base URL and a key with exactly one `/`.
pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// A stored object: bytes plus the content type it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
}

/// In-process blob store used by tests.
#[derive(Debug)]
pub struct MemoryBlobStore {
    base_url: String,
    objects: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(key).cloned())
    }

    /// Keys currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| StorageError::backend("memory put", e))?;
        objects.insert(
            key.to_owned(),
            StoredBlob {
                data,
                content_type: content_type.to_owned(),
            },
        );
        Ok(join_url(&self.base_url, key))
    }
}

// ---------------------------------------------------------------------------
// LocalBlobStore
// ---------------------------------------------------------------------------

/// Blob store backed by a directory on local disk, for development setups
/// without object storage.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalBlobStore {
    /// Objects are written under `root`. Returned URLs are
    /// `{public_base_url}/{key}` when a base URL is given, otherwise
    /// `file://` URLs.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, key: &str, path: &Path) -> String {
        match &self.public_base_url {
            Some(base) => join_url(base, key),
            None => format!("file://{}", path.display()),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never observe a partial object.
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;

        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        Ok(self.url_for(key, &absolute))
    }
}
