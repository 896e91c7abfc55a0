use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid identifier \"{identifier}\": {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("invalid locator \"{locator}\": {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("no element matching {locator} within {timeout_ms}ms")]
    Timeout { locator: String, timeout_ms: u128 },

    #[error("could not extract {field}: {reason}")]
    Extraction { field: String, reason: String },
}

impl ScraperError {
    /// `true` when the error means the source has no page for the request,
    /// as opposed to the source being unreachable or misbehaving.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScraperError::NotFound { .. })
    }

    pub(crate) fn extraction(field: &str, reason: impl Into<String>) -> Self {
        ScraperError::Extraction {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}
