use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Object-storage settings. Present only when `PAGESCOPE_S3_BUCKET` is set.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (`MinIO`, R2, ...).
    pub endpoint: Option<String>,
    /// Base URL used to build the stable URL returned for each stored object.
    pub public_base_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("public_base_url", &self.public_base_url)
            .field(
                "access_key_id",
                &self.access_key_id.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub source_base_url: String,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    pub field_timeout_secs: u64,
    pub acquire_budget_secs: u64,
    pub post_limit: usize,
    pub s3: Option<S3Settings>,
    pub blob_dir: PathBuf,
    pub summary_api_url: Option<String>,
    pub summary_api_key: Option<String>,
    pub summary_model: String,
    pub refresh_cron: String,
    pub refresh_stale_hours: u32,
    pub refresh_max_concurrent: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[redacted]"))
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("source_base_url", &self.source_base_url)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .field("field_timeout_secs", &self.field_timeout_secs)
            .field("acquire_budget_secs", &self.acquire_budget_secs)
            .field("post_limit", &self.post_limit)
            .field("s3", &self.s3)
            .field("blob_dir", &self.blob_dir)
            .field("summary_api_url", &self.summary_api_url)
            .field(
                "summary_api_key",
                &self.summary_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("summary_model", &self.summary_model)
            .field("refresh_cron", &self.refresh_cron)
            .field("refresh_stale_hours", &self.refresh_stale_hours)
            .field("refresh_max_concurrent", &self.refresh_max_concurrent)
            .finish()
    }
}
