use crate::app_config::{AppConfig, Environment, S3Settings};
use crate::ConfigError;

/// Longest cache entry lifetime accepted, 30 days.
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Longest acquisition budget accepted, one hour.
pub const MAX_ACQUIRE_BUDGET_SECS: u64 = 60 * 60;

/// Longest per-field extraction timeout accepted.
pub const MAX_FIELD_TIMEOUT_SECS: u64 = MAX_ACQUIRE_BUDGET_SECS;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files, which suits tests
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation are decoupled from the process environment so that
/// callers and tests can supply a `HashMap` lookup instead.
///
/// # Errors
///
/// Returns [`ConfigError`] if a required variable is missing or any value is
/// invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Blank values are treated as unset so `.env` templates can leave them empty.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("PAGESCOPE_ENV", "development"))?;
    let bind_addr = parse_addr("PAGESCOPE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("PAGESCOPE_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("PAGESCOPE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("PAGESCOPE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("PAGESCOPE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let redis_url = optional("PAGESCOPE_REDIS_URL");
    let cache_ttl_secs = parse_bounded_secs(
        &lookup,
        "PAGESCOPE_CACHE_TTL_SECS",
        300,
        MAX_CACHE_TTL_SECS,
    )?;

    let source_base_url = or_default("PAGESCOPE_SOURCE_BASE_URL", "https://www.facebook.com")
        .trim_end_matches('/')
        .to_string();
    if !source_base_url.starts_with("http://") && !source_base_url.starts_with("https://") {
        return Err(invalid(
            "PAGESCOPE_SOURCE_BASE_URL",
            "must be an http(s) URL",
        ));
    }

    let scraper_request_timeout_secs = parse_u64("PAGESCOPE_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default(
        "PAGESCOPE_SCRAPER_USER_AGENT",
        "pagescope/0.1 (profile-acquisition)",
    );
    let scraper_max_retries = parse_u32("PAGESCOPE_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("PAGESCOPE_SCRAPER_RETRY_BACKOFF_BASE_SECS", "1")?;

    let field_timeout_secs = parse_bounded_secs(
        &lookup,
        "PAGESCOPE_FIELD_TIMEOUT_SECS",
        10,
        MAX_FIELD_TIMEOUT_SECS,
    )?;
    let acquire_budget_secs = parse_bounded_secs(
        &lookup,
        "PAGESCOPE_ACQUIRE_BUDGET_SECS",
        120,
        MAX_ACQUIRE_BUDGET_SECS,
    )?;
    let post_limit = parse_usize("PAGESCOPE_POST_LIMIT", "25")?;

    let s3 = optional("PAGESCOPE_S3_BUCKET").map(|bucket| S3Settings {
        bucket,
        region: or_default("PAGESCOPE_S3_REGION", "us-east-1"),
        endpoint: optional("PAGESCOPE_S3_ENDPOINT"),
        public_base_url: optional("PAGESCOPE_S3_PUBLIC_BASE_URL"),
        access_key_id: optional("PAGESCOPE_S3_ACCESS_KEY_ID"),
        secret_access_key: optional("PAGESCOPE_S3_SECRET_ACCESS_KEY"),
    });
    if let Some(s3) = &s3 {
        if s3.access_key_id.is_some() != s3.secret_access_key.is_some() {
            return Err(invalid(
                "PAGESCOPE_S3_ACCESS_KEY_ID",
                "access key id and secret access key must be set together",
            ));
        }
    }
    let blob_dir = PathBuf::from(or_default("PAGESCOPE_BLOB_DIR", "./data/blobs"));

    let summary_api_url = optional("PAGESCOPE_SUMMARY_API_URL");
    let summary_api_key = optional("PAGESCOPE_SUMMARY_API_KEY");
    let summary_model = or_default("PAGESCOPE_SUMMARY_MODEL", "gpt-4o-mini");

    let refresh_cron = or_default("PAGESCOPE_REFRESH_CRON", "0 0 */6 * * *");
    let refresh_stale_hours = parse_u32("PAGESCOPE_REFRESH_STALE_HOURS", "24")?;
    let refresh_max_concurrent = parse_usize("PAGESCOPE_REFRESH_MAX_CONCURRENT", "2")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        redis_url,
        cache_ttl_secs,
        source_base_url,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        field_timeout_secs,
        acquire_budget_secs,
        post_limit,
        s3,
        blob_dir,
        summary_api_url,
        summary_api_key,
        summary_model,
        refresh_cron,
        refresh_stale_hours,
        refresh_max_concurrent,
    })
}

/// Parse a duration in seconds that must fall within `1..=max`.
///
/// Durations are added to monotonic instants downstream, so an unbounded
/// value would overflow there instead of failing here.
fn parse_bounded_secs<F>(lookup: &F, var: &str, default: u64, max: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let secs = match lookup(var) {
        Ok(raw) => raw.parse::<u64>().map_err(|e| invalid(var, e))?,
        Err(_) => default,
    };
    if secs == 0 {
        return Err(invalid(var, "must be greater than 0"));
    }
    if secs > max {
        return Err(invalid(var, format!("must be at most {max}")));
    }
    Ok(secs)
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(invalid(
            "PAGESCOPE_ENV",
            format!("unknown environment \"{other}\""),
        )),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
