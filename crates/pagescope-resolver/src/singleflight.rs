//! Keyed request coalescing: at most one in-flight computation per key,
//! every concurrent caller observes its result.
//!
//! The leader's work runs on a spawned task, so dropping any caller
//! (including the one that started it) does not cancel the computation the
//! others are waiting on.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

pub struct SingleFlight<K, T, E> {
    inflight: Arc<DashMap<K, Flight<T, E>>>,
}

impl<K, T, E> Default for SingleFlight<K, T, E>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

/// Removes the key when the leader task finishes or unwinds.
struct ClearOnDrop<K: Hash + Eq, T, E> {
    inflight: Arc<DashMap<K, Flight<T, E>>>,
    key: Option<K>,
}

impl<K: Hash + Eq, T, E> Drop for ClearOnDrop<K, T, E> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.inflight.remove(&key);
        }
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a computation in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Runs `factory` for `key` unless a computation for `key` is already in
    /// flight, in which case its result is awaited instead.
    ///
    /// `on_abort` builds the error returned to every waiter if the leader
    /// task panics.
    ///
    /// # Errors
    ///
    /// Returns the computation's error, or `on_abort()` if it panicked.
    pub async fn run<F, Fut>(&self, key: K, factory: F, on_abort: fn() -> E) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel::<Result<T, E>>();
                let flight: Flight<T, E> = rx
                    .map(move |received| received.unwrap_or_else(|_| Err(on_abort())))
                    .boxed()
                    .shared();
                entry.insert(flight.clone());

                let work = factory();
                let guard = ClearOnDrop {
                    inflight: Arc::clone(&self.inflight),
                    key: Some(key),
                };
                tokio::spawn(async move {
                    let result = work.await;
                    // Clear before publishing so late arrivals start a fresh flight.
                    drop(guard);
                    let _ = tx.send(result);
                });

                flight
            }
        };

        flight.await
    }
}
