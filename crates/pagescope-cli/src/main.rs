use clap::{Parser, Subcommand};
use pagescope_core::AppConfig;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

/// Upper bound on profiles refreshed by one `refresh` run.
const REFRESH_BATCH_LIMIT: i64 = 500;

#[derive(Debug, Parser)]
#[command(name = "pagescope-cli")]
#[command(about = "Pagescope profile resolver command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations.
    Migrate,
    /// Resolve a profile through cache, store and live acquisition, and
    /// print it as JSON.
    Resolve { identifier: String },
    /// Re-acquire one profile, or every profile older than the stale
    /// threshold.
    Refresh {
        #[arg(long, conflicts_with = "stale_hours")]
        identifier: Option<String>,
        /// Defaults to `PAGESCOPE_REFRESH_STALE_HOURS`.
        #[arg(long)]
        stale_hours: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("pagescope-cli: run with --help for available commands");
        return Ok(());
    };

    let config = pagescope_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = pagescope_db::PoolConfig::from_app_config(&config);
    let pool = pagescope_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Migrate => {
            let applied = pagescope_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Resolve { identifier } => {
            let resolver = pagescope_resolver::build_resolver(&config, pool).await?;
            let profile = resolver.resolve(&identifier).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Refresh {
            identifier,
            stale_hours,
        } => run_refresh(&config, pool, identifier, stale_hours).await?,
    }

    Ok(())
}

async fn run_refresh(
    config: &AppConfig,
    pool: PgPool,
    identifier: Option<String>,
    stale_hours: Option<u32>,
) -> anyhow::Result<()> {
    let identifiers = match identifier {
        Some(identifier) => vec![identifier],
        None => {
            let hours = stale_hours.unwrap_or(config.refresh_stale_hours);
            let older_than = chrono::Utc::now() - chrono::Duration::hours(i64::from(hours));
            pagescope_db::list_stale_page_usernames(&pool, older_than, REFRESH_BATCH_LIMIT).await?
        }
    };

    if identifiers.is_empty() {
        println!("nothing to refresh");
        return Ok(());
    }

    let resolver = pagescope_resolver::build_resolver(config, pool).await?;
    let outcome =
        pagescope_resolver::refresh_all(&resolver, identifiers, config.refresh_max_concurrent)
            .await;

    for identifier in &outcome.refreshed {
        println!("refreshed {identifier}");
    }
    for (identifier, error) in &outcome.failed {
        eprintln!("failed {identifier}: {error}");
    }
    if !outcome.failed.is_empty() {
        anyhow::bail!("{} profile(s) failed to refresh", outcome.failed.len());
    }
    Ok(())
}
