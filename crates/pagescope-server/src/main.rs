mod api;
mod middleware;
mod scheduler;
mod summary;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
    summary::{HttpSummarizer, Summarizer},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(pagescope_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = pagescope_db::PoolConfig::from_app_config(&config);
    let pool = pagescope_db::connect_pool(&config.database_url, pool_config).await?;
    pagescope_db::run_migrations(&pool).await?;

    let resolver = Arc::new(pagescope_resolver::build_resolver(&config, pool.clone()).await?);
    let summarizer = HttpSummarizer::from_app_config(&config)?
        .map(|s| Arc::new(s) as Arc<dyn Summarizer>);
    if summarizer.is_none() {
        tracing::warn!("PAGESCOPE_SUMMARY_API_URL not set; summary endpoint disabled");
    }

    let _scheduler =
        scheduler::build_scheduler(pool.clone(), Arc::clone(&resolver), Arc::clone(&config))
            .await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        pagescope_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            resolver,
            summarizer,
        },
        auth,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "pagescope-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
