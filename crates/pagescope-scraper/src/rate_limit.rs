//! Retry with exponential backoff and jitter for source and media fetches.
//!
//! Transient failures (429, 5xx, network errors) are retried; everything else
//! (404, other 4xx, extraction errors) is propagated immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Upper bound on any single backoff sleep.
const MAX_DELAY_SECS: u64 = 60;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } | ScraperError::Http(_) => true,
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Computes the sleep before the retry that follows `attempt` (zero-based).
///
/// The exponential term is `backoff_base_secs * 2^attempt`, raised to the
/// server's `Retry-After` for 429s, capped at [`MAX_DELAY_SECS`], then
/// scaled by a random factor in `[0.75, 1.25)`.
fn backoff_delay(err: &ScraperError, attempt: u32, backoff_base_secs: u64) -> Duration {
    let exponential = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
    let floor = match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => *retry_after_secs,
        _ => 0,
    };
    let capped_ms = exponential.max(floor).min(MAX_DELAY_SECS) * 1000;

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let jittered_ms = (capped_ms as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    Duration::from_millis(jittered_ms)
}

/// Executes `operation`, retrying transient errors up to `max_retries`
/// additional times.
///
/// With `max_retries = 3` the operation is attempted at most 4 times. When
/// retries are exhausted the last error is returned.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay = backoff_delay(&err, attempt, backoff_base_secs);
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms = delay.as_millis(),
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
