//! Natural-language profile summaries from an OpenAI-compatible
//! chat-completions endpoint.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use pagescope_core::{AppConfig, Profile};
use serde_json::{json, Value};
use thiserror::Error;

/// Posts included in the prompt.
const PROMPT_POSTS: usize = 5;
/// Characters kept from each post's text.
const PROMPT_POST_CHARS: usize = 280;
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("summary API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("summary API response had no message content")]
    EmptyResponse,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SummaryError`] if the summary cannot be produced.
    async fn summarize(&self, profile: &Profile) -> Result<String, SummaryError>;
}

pub struct HttpSummarizer {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl HttpSummarizer {
    /// `api_base` may be given with or without a trailing
    /// `/chat/completions`.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self, SummaryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_base: normalize_api_base(api_base),
            api_key,
            model: model.into(),
        })
    }

    /// `None` when no summary endpoint is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Http`] if the HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Option<Self>, SummaryError> {
        config
            .summary_api_url
            .as_deref()
            .map(|url| {
                Self::new(
                    url,
                    config.summary_api_key.clone(),
                    config.summary_model.clone(),
                )
            })
            .transpose()
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    #[tracing::instrument(skip(self, profile), fields(identifier = %profile.username, model = %self.model))]
    async fn summarize(&self, profile: &Profile) -> Result<String, SummaryError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You summarize social media pages in two or three sentences."
                },
                { "role": "user", "content": build_prompt(profile) }
            ],
            "temperature": 0.3,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await?;
        extract_chat_message(&value)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or(SummaryError::EmptyResponse)
    }
}

fn normalize_api_base(base: &str) -> String {
    base.trim_end_matches('/')
        .trim_end_matches("/chat/completions")
        .to_owned()
}

fn extract_chat_message(value: &Value) -> Option<&str> {
    value
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
}

/// Page metadata followed by the most recent posts.
fn build_prompt(profile: &Profile) -> String {
    let mut prompt = format!(
        "Page: {}\nCategory: {}\nFollowers: {}\nLikes: {}\n",
        profile.name, profile.category, profile.followers_count, profile.likes_count
    );
    if let Some(website) = &profile.website {
        let _ = writeln!(prompt, "Website: {website}");
    }

    let recent: Vec<&str> = profile
        .posts
        .iter()
        .map(|post| post.content.trim())
        .filter(|content| !content.is_empty())
        .take(PROMPT_POSTS)
        .collect();
    if !recent.is_empty() {
        prompt.push_str("\nRecent posts:\n");
        for content in recent {
            let clipped: String = content.chars().take(PROMPT_POST_CHARS).collect();
            let _ = writeln!(prompt, "- {clipped}");
        }
    }
    prompt
}
