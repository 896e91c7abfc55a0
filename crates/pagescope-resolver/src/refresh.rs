//! Batch re-acquisition of stored profiles.

use futures::stream::{self, StreamExt};

use crate::error::ResolveError;
use crate::resolver::Resolver;

#[derive(Debug, Default)]
pub struct RefreshOutcome {
    pub refreshed: Vec<String>,
    pub failed: Vec<(String, ResolveError)>,
}

/// Refreshes every identifier with at most `max_concurrent` runs in flight.
/// Failures are logged and collected; they never stop the batch.
pub async fn refresh_all(
    resolver: &Resolver,
    identifiers: Vec<String>,
    max_concurrent: usize,
) -> RefreshOutcome {
    let results: Vec<(String, Result<(), ResolveError>)> = stream::iter(identifiers)
        .map(|identifier| async move {
            let result = resolver.refresh(&identifier).await.map(|_| ());
            (identifier, result)
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let mut outcome = RefreshOutcome::default();
    for (identifier, result) in results {
        match result {
            Ok(()) => {
                tracing::info!(identifier, "profile refreshed");
                outcome.refreshed.push(identifier);
            }
            Err(e) => {
                tracing::warn!(identifier, error = %e, "profile refresh failed");
                outcome.failed.push((identifier, e));
            }
        }
    }
    outcome.refreshed.sort();
    outcome
}
