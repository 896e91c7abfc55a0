//! Three-tier profile lookup: cache, then store, then live acquisition.

use std::sync::Arc;
use std::time::Duration;

use pagescope_core::{validate_identifier, Profile};
use pagescope_storage::LookupCache;

use crate::acquire::AcquisitionEngine;
use crate::error::ResolveError;
use crate::singleflight::SingleFlight;
use crate::store::ProfileStore;

/// Cache key for a resolved profile.
#[must_use]
pub fn cache_key(identifier: &str) -> String {
    format!("page:{identifier}")
}

/// Flight key for refreshes. `#` never appears in a valid identifier, so a
/// refresh never joins a plain lookup's store read. Both still share the
/// acquisition flight keyed by the bare identifier.
fn refresh_flight_key(identifier: &str) -> String {
    format!("{identifier}#refresh")
}

fn aborted() -> ResolveError {
    ResolveError::Internal("profile lookup task aborted".to_owned())
}

struct Inner {
    cache: Arc<dyn LookupCache>,
    store: Arc<dyn ProfileStore>,
    engine: AcquisitionEngine,
    cache_ttl: Duration,
    acquisitions: SingleFlight<String, (), ResolveError>,
}

/// Entry point for profile lookups. Concurrent lookups of the same
/// identifier share one store read, and lookups and refreshes of the same
/// identifier share at most one acquisition.
pub struct Resolver {
    inner: Arc<Inner>,
    flights: SingleFlight<String, Profile, ResolveError>,
}

impl Resolver {
    #[must_use]
    pub fn new(
        cache: Arc<dyn LookupCache>,
        store: Arc<dyn ProfileStore>,
        engine: AcquisitionEngine,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                store,
                engine,
                cache_ttl,
                acquisitions: SingleFlight::new(),
            }),
            flights: SingleFlight::new(),
        }
    }

    /// Returns the profile for `identifier`, acquiring it from the source
    /// if it has never been stored.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::InvalidIdentifier`] before any tier is consulted.
    /// - [`ResolveError::StoreUnavailable`] if the store cannot be read.
    /// - [`ResolveError::NotFoundUpstream`] or [`ResolveError::Acquisition`]
    ///   if acquisition fails.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, identifier: &str) -> Result<Profile, ResolveError> {
        let identifier = validate_identifier(identifier)?.to_owned();

        if let Some(profile) = self.inner.cached(&identifier).await {
            tracing::debug!(identifier, "cache hit");
            return Ok(profile);
        }

        let inner = Arc::clone(&self.inner);
        self.flights
            .run(
                identifier.clone(),
                move || async move { inner.lookup_or_acquire(&identifier).await },
                aborted,
            )
            .await
    }

    /// Re-acquires `identifier` from the source regardless of what is
    /// stored, then overwrites the cache entry.
    ///
    /// # Errors
    ///
    /// Same as [`Resolver::resolve`].
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self, identifier: &str) -> Result<Profile, ResolveError> {
        let identifier = validate_identifier(identifier)?.to_owned();
        let inner = Arc::clone(&self.inner);
        self.flights
            .run(
                refresh_flight_key(&identifier),
                move || async move { inner.acquire_and_load(&identifier).await },
                aborted,
            )
            .await
    }

    /// Drops the cached entry for `identifier`, if any.
    pub async fn invalidate(&self, identifier: &str) {
        if let Err(e) = self.inner.cache.delete(&cache_key(identifier)).await {
            tracing::warn!(identifier, error = %e, "cache delete failed");
        }
    }
}

impl Inner {
    /// Cache read. Backend and decode errors count as a miss.
    async fn cached(&self, identifier: &str) -> Option<Profile> {
        let key = cache_key(identifier);
        let raw = match self.cache.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(identifier, error = %e, "cache read failed, falling through");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(identifier, error = %e, "discarding undecodable cache entry");
                let _ = self.cache.delete(&key).await;
                None
            }
        }
    }

    async fn populate(&self, profile: &Profile) {
        let json = match serde_json::to_string(profile) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(identifier = %profile.username, error = %e, "profile not cacheable");
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set(&cache_key(&profile.username), &json, self.cache_ttl)
            .await
        {
            tracing::warn!(identifier = %profile.username, error = %e, "cache write failed");
        }
    }

    async fn load(&self, identifier: &str) -> Result<Option<Profile>, ResolveError> {
        self.store
            .find_profile(identifier)
            .await
            .map_err(|e| ResolveError::StoreUnavailable(e.to_string()))
    }

    async fn lookup_or_acquire(
        self: &Arc<Self>,
        identifier: &str,
    ) -> Result<Profile, ResolveError> {
        if let Some(profile) = self.load(identifier).await? {
            tracing::debug!(identifier, "store hit");
            self.populate(&profile).await;
            return Ok(profile);
        }

        tracing::info!(identifier, "profile not stored, acquiring");
        self.acquire_and_load(identifier).await
    }

    /// Runs the acquisition for `identifier` unless one is already in flight,
    /// then reads the stored profile back.
    async fn acquire_and_load(
        self: &Arc<Self>,
        identifier: &str,
    ) -> Result<Profile, ResolveError> {
        let inner = Arc::clone(self);
        let owned = identifier.to_owned();
        self.acquisitions
            .run(
                identifier.to_owned(),
                move || async move {
                    inner
                        .engine
                        .acquire(&owned)
                        .await
                        .map(|_| ())
                        .map_err(|failure| failure.into_resolve_error(&owned))
                },
                aborted,
            )
            .await?;

        let profile = self.load(identifier).await?.ok_or_else(|| {
            ResolveError::Internal(format!("{identifier} missing from store after acquisition"))
        })?;
        self.populate(&profile).await;
        Ok(profile)
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
