use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pagescope_core::{validate_identifier, AppConfig};
use reqwest::{Client, Response, StatusCode};

use crate::error::ScraperError;
use crate::html::HtmlPage;
use crate::rate_limit::retry_with_backoff;
use crate::source::{PageHandle, PageSource};

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default `Retry-After` when a 429 carries none.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, ScraperError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(user_agent)
        .build()?)
}

/// Maps non-success statuses to typed errors; passes 2xx responses through.
fn check_status(response: Response, url: &str) -> Result<Response, ScraperError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ScraperError::RateLimited {
            domain: extract_domain(url),
            retry_after_secs,
        });
    }

    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(ScraperError::NotFound {
            url: url.to_owned(),
        });
    }

    if !status.is_success() {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    Ok(response)
}

// ---------------------------------------------------------------------------
// HttpPageSource
// ---------------------------------------------------------------------------

/// Fetches `{base_url}/{identifier}` over HTTP and exposes the response body
/// as an [`HtmlPage`].
///
/// Transient errors (429, 5xx, network failures) are retried with
/// exponential backoff up to `max_retries` additional attempts.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HttpPageSource {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            max_retries,
            backoff_base_secs,
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            &config.source_base_url,
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_secs,
        )
    }

    pub(crate) fn page_url(&self, identifier: &str) -> Result<String, ScraperError> {
        let identifier =
            validate_identifier(identifier).map_err(|e| ScraperError::InvalidIdentifier {
                identifier: identifier.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(format!("{}/{identifier}", self.base_url))
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn render(&self, identifier: &str) -> Result<Box<dyn PageHandle>, ScraperError> {
        let url = self.page_url(identifier)?;

        let (final_url, body) = retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self.client.get(&url).send().await?;
                let response = check_status(response, &url)?;
                let final_url = response.url().to_string();
                let body = response.text().await?;
                Ok((final_url, body))
            }
        })
        .await?;

        tracing::debug!(identifier, url = %final_url, bytes = body.len(), "rendered page");
        Ok(Box::new(HtmlPage::new(final_url, &body)))
    }
}

// ---------------------------------------------------------------------------
// MediaClient
// ---------------------------------------------------------------------------

/// Bytes and declared content type of a fetched media asset.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    /// Upstream `Content-Type`, if the response carried one.
    pub content_type: Option<String>,
}

/// Downloads media assets (avatars, post images) from source CDNs with the
/// same retry policy as page fetches.
#[derive(Debug, Clone)]
pub struct MediaClient {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl MediaClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            max_retries,
            backoff_base_secs,
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_secs,
        )
    }

    /// Fetches `url`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::NotFound`] for 404/410 (not retried).
    /// - [`ScraperError::UnexpectedStatus`] for other non-2xx statuses.
    /// - [`ScraperError::RateLimited`] / [`ScraperError::Http`] once retries
    ///   are exhausted.
    pub async fn fetch(&self, url: &str) -> Result<FetchedMedia, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async move {
            let response = self.client.get(url).send().await?;
            let response = check_status(response, url)?;
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let bytes = response.bytes().await?;
            Ok(FetchedMedia {
                bytes,
                content_type,
            })
        })
        .await
    }
}

/// Host portion of `url`, for rate-limit messages.
pub(crate) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
