use pagescope_scraper::ScraperError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid blob key \"{key}\": {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("media fetch failed: {0}")]
    Fetch(#[from] ScraperError),

    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{op} failed: {message}")]
    Backend { op: &'static str, message: String },

    #[error("cache error: {0}")]
    Cache(String),
}

impl StorageError {
    pub(crate) fn backend(op: &'static str, err: impl std::fmt::Display) -> Self {
        StorageError::Backend {
            op,
            message: err.to_string(),
        }
    }
}
