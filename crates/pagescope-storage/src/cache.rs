//! Time-bounded key/value cache in front of the persistent store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::StorageError;

#[async_trait]
pub trait LookupCache: Send + Sync {
    /// # Errors
    ///
    /// Returns [`StorageError::Cache`] if the backend cannot be reached.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Cache`] if the backend cannot be reached.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns [`StorageError::Cache`] if the backend cannot be reached.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process cache, used when no Redis URL is configured and in tests.
///
/// Expiry is checked lazily on read.
#[derive(Debug, Default)]
pub struct MemoryLookupCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryLookupCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `key` expires, or `None` if it is absent or expired.
    #[must_use]
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().ok()?;
        let (_, expires_at) = entries.get(key)?;
        expires_at.checked_duration_since(Instant::now())
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>>, StorageError> {
        self.entries
            .lock()
            .map_err(|e| StorageError::Cache(e.to_string()))
    }
}

#[async_trait]
impl LookupCache for MemoryLookupCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Also purges every expired entry, so the map stays bounded by the
    /// number of live keys.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| {
                StorageError::Cache(format!("ttl of {}s is out of range", ttl.as_secs()))
            })?;
        let mut entries = self.lock()?;
        entries.retain(|_, (_, entry_expires_at)| *entry_expires_at > now);
        entries.insert(key.to_owned(), (value.to_owned(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MemoryLookupCache::new();
        cache
            .set("page:acme", "{}", Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(cache.get("page:acme").await.unwrap().as_deref(), Some("{}"));
        assert!(cache.ttl_remaining("page:acme").unwrap() <= Duration::from_secs(300));

        tokio::time::advance(Duration::from_secs(301)).await;

        assert!(cache.get("page:acme").await.unwrap().is_none());
        assert!(cache.ttl_remaining("page:acme").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn set_purges_expired_entries() {
        let cache = MemoryLookupCache::new();
        cache.set("page:old", "{}", Duration::from_secs(10)).await.unwrap();
        cache.set("page:live", "{}", Duration::from_secs(600)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.set("page:new", "{}", Duration::from_secs(600)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.ttl_remaining("page:old").is_none());
        assert!(cache.get("page:live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_rejected() {
        let cache = MemoryLookupCache::new();
        let result = cache.set("page:acme", "{}", Duration::MAX).await;
        assert!(matches!(result, Err(StorageError::Cache(_))));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = MemoryLookupCache::new();
        cache.set("page:acme", "{}", Duration::from_secs(60)).await.unwrap();
        cache.delete("page:acme").await.unwrap();
        assert!(cache.get("page:acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites_value_and_ttl() {
        let cache = MemoryLookupCache::new();
        cache.set("page:acme", "old", Duration::from_secs(1)).await.unwrap();
        cache.set("page:acme", "new", Duration::from_secs(600)).await.unwrap();

        assert_eq!(cache.get("page:acme").await.unwrap().as_deref(), Some("new"));
        assert!(cache.ttl_remaining("page:acme").unwrap() > Duration::from_secs(500));
    }
}
