//! Background job scheduler.
//!
//! Registers the stale-profile refresh job at server startup.

use std::sync::Arc;

use chrono::Utc;
use pagescope_core::AppConfig;
use pagescope_resolver::{refresh_all, Resolver};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Upper bound on profiles refreshed by one scheduled run.
const REFRESH_BATCH_LIMIT: i64 = 200;

/// Builds and starts the background job scheduler.
///
/// The returned handle must be kept alive for the lifetime of the process;
/// dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    resolver: Arc<Resolver>,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_refresh_job(&scheduler, pool, resolver, config).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Refreshes pages whose `last_scraped` is older than
/// `PAGESCOPE_REFRESH_STALE_HOURS`, on `PAGESCOPE_REFRESH_CRON`.
async fn register_refresh_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    resolver: Arc<Resolver>,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let cron = config.refresh_cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = pool.clone();
        let resolver = Arc::clone(&resolver);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting stale profile refresh");
            run_refresh_job(&pool, &resolver, &config).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered stale profile refresh");
    Ok(())
}

async fn run_refresh_job(pool: &PgPool, resolver: &Resolver, config: &AppConfig) {
    let older_than = Utc::now() - chrono::Duration::hours(i64::from(config.refresh_stale_hours));
    let stale =
        match pagescope_db::list_stale_page_usernames(pool, older_than, REFRESH_BATCH_LIMIT).await {
            Ok(stale) => stale,
            Err(e) => {
                tracing::error!(error = %e, "scheduler: failed to list stale pages");
                return;
            }
        };

    if stale.is_empty() {
        tracing::info!("scheduler: no stale pages; skipping");
        return;
    }

    let outcome = refresh_all(resolver, stale, config.refresh_max_concurrent).await;
    tracing::info!(
        refreshed = outcome.refreshed.len(),
        failed = outcome.failed.len(),
        "scheduler: stale profile refresh complete"
    );
}
