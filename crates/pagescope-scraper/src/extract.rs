//! Field extractors that turn a rendered page into scrape-time records.
//!
//! Every locator the acquisition pipeline relies on lives here so a markup
//! change on the source side is a one-file fix.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pagescope_core::{RelationKind, ScrapedPost, ScrapedProfile, ScrapedSocialUser};
use regex::Regex;

use crate::error::ScraperError;
use crate::locator::Locator;
use crate::source::{ElementHandle, PageHandle};

fn loc(raw: &str) -> Locator {
    Locator::parse(raw).expect("valid locator")
}

// Profile fields
static NAME: LazyLock<Locator> = LazyLock::new(|| loc("h1"));
static PAGE_ID: LazyLock<Locator> = LazyLock::new(|| loc("meta[property=fb:page_id]"));
static AVATAR: LazyLock<Locator> = LazyLock::new(|| loc("img[data-testid=profile_picture]"));
static CATEGORY: LazyLock<Locator> = LazyLock::new(|| loc("[data-key=page_category]"));
static FOLLOWERS_COUNT: LazyLock<Locator> = LazyLock::new(|| loc("[data-key=followers_count]"));
static LIKES_COUNT: LazyLock<Locator> = LazyLock::new(|| loc("[data-key=likes_count]"));
static EMAIL: LazyLock<Locator> = LazyLock::new(|| loc("a[data-key=email]"));
static WEBSITE: LazyLock<Locator> = LazyLock::new(|| loc("a[data-key=website]"));
static CREATED: LazyLock<Locator> = LazyLock::new(|| loc("time[data-key=page_created]"));

// Post fields
static POST_CONTAINER: LazyLock<Locator> =
    LazyLock::new(|| loc("div[data-testid=post_container]"));
static POST_CONTENT: LazyLock<Locator> = LazyLock::new(|| loc("[data-ad-preview=message]"));
static POST_UTIME: LazyLock<Locator> = LazyLock::new(|| loc("abbr[data-utime]"));
static POST_TIME: LazyLock<Locator> = LazyLock::new(|| loc("time[datetime]"));
static POST_REACTIONS: LazyLock<Locator> = LazyLock::new(|| loc("[data-key=reactions_count]"));
static POST_COMMENTS: LazyLock<Locator> = LazyLock::new(|| loc("[data-key=comments_count]"));
static POST_MEDIA: LazyLock<Locator> = LazyLock::new(|| loc("img[data-testid=post_media]"));

/// Attribute carrying a post's source id on its container.
pub const POST_ID_ATTR: &str = "data-post-id";

// Relation lists
static FOLLOWER_ITEM: LazyLock<Locator> = LazyLock::new(|| loc("[data-testid=follower_item]"));
static FOLLOWING_ITEM: LazyLock<Locator> = LazyLock::new(|| loc("[data-testid=following_item]"));
static USER_NAME: LazyLock<Locator> = LazyLock::new(|| loc("[data-key=user_name]"));
static USER_AVATAR: LazyLock<Locator> = LazyLock::new(|| loc("img"));
const USER_ID_ATTR: &str = "data-user-id";

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([KkMmBb])?\b").expect("valid count regex")
});

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

async fn text_field(page: &dyn PageHandle, locator: &Locator, timeout: Duration) -> Option<String> {
    match tokio::time::timeout(timeout, page.wait_for_text(locator, timeout)).await {
        Ok(Ok(text)) if !text.is_empty() => Some(text),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            tracing::debug!(%locator, error = %e, "profile field missing");
            None
        }
        Err(_) => {
            tracing::debug!(%locator, "profile field timed out");
            None
        }
    }
}

async fn attr_field(
    page: &dyn PageHandle,
    locator: &Locator,
    name: &str,
    timeout: Duration,
) -> Option<String> {
    match tokio::time::timeout(timeout, page.attribute(locator, name)).await {
        Ok(Ok(Some(value))) => {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_owned())
        }
        Ok(Ok(None)) => None,
        Ok(Err(e)) => {
            tracing::debug!(%locator, attribute = name, error = %e, "profile attribute missing");
            None
        }
        Err(_) => {
            tracing::debug!(%locator, attribute = name, "profile attribute timed out");
            None
        }
    }
}

/// Extracts profile-level fields from `page`.
///
/// Each field is looked up independently under `field_timeout`; a field
/// that is missing or times out takes its empty/default value. The caller
/// decides whether the result is usable (see
/// [`ScrapedProfile::name`] and [`ScrapedProfile::facebook_id`]).
pub async fn extract_profile(
    page: &dyn PageHandle,
    identifier: &str,
    field_timeout: Duration,
) -> ScrapedProfile {
    let t = field_timeout;
    let (name, page_id, avatar, category, followers, likes, email, website, created) = tokio::join!(
        text_field(page, &NAME, t),
        attr_field(page, &PAGE_ID, "content", t),
        attr_field(page, &AVATAR, "src", t),
        text_field(page, &CATEGORY, t),
        text_field(page, &FOLLOWERS_COUNT, t),
        text_field(page, &LIKES_COUNT, t),
        text_field(page, &EMAIL, t),
        attr_field(page, &WEBSITE, "href", t),
        attr_field(page, &CREATED, "datetime", t),
    );

    ScrapedProfile {
        username: identifier.to_owned(),
        facebook_id: page_id,
        name: name.unwrap_or_default(),
        url: page.current_url().to_owned(),
        profile_pic_url: avatar.unwrap_or_default(),
        email,
        website,
        category: category.unwrap_or_default(),
        followers_count: followers.as_deref().and_then(parse_count).unwrap_or(0),
        likes_count: likes.as_deref().and_then(parse_count).unwrap_or(0),
        created_at: created.as_deref().and_then(parse_datetime),
    }
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// The first `limit` post containers on the page, in page order.
///
/// # Errors
///
/// Returns [`ScraperError`] if the page cannot be queried.
pub async fn post_containers(
    page: &dyn PageHandle,
    limit: usize,
) -> Result<Vec<Box<dyn ElementHandle>>, ScraperError> {
    let mut containers = page.elements(&POST_CONTAINER).await?;
    containers.truncate(limit);
    Ok(containers)
}

/// Source id of a post container, when present.
pub async fn post_id(container: &dyn ElementHandle) -> Option<String> {
    container
        .attribute(POST_ID_ATTR)
        .await
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
}

/// Extracts one post from its container.
///
/// # Errors
///
/// Returns [`ScraperError::Extraction`] when the post id or the posting time
/// is missing or unparseable. Other fields default when absent.
pub async fn extract_post(container: &dyn ElementHandle) -> Result<ScrapedPost, ScraperError> {
    let facebook_id = post_id(container)
        .await
        .ok_or_else(|| ScraperError::extraction("post id", format!("missing {POST_ID_ATTR}")))?;

    let posted_at = match container.attribute_of(&POST_UTIME, "data-utime").await {
        Some(raw) => parse_epoch(&raw),
        None => container
            .attribute_of(&POST_TIME, "datetime")
            .await
            .as_deref()
            .and_then(parse_datetime),
    }
    .ok_or_else(|| {
        ScraperError::extraction("posted_at", format!("post {facebook_id} has no usable timestamp"))
    })?;

    let content = container.text_of(&POST_CONTENT).await.unwrap_or_default();
    let likes_count = container
        .text_of(&POST_REACTIONS)
        .await
        .as_deref()
        .and_then(parse_count)
        .unwrap_or(0);
    let comments_count = container
        .text_of(&POST_COMMENTS)
        .await
        .as_deref()
        .and_then(parse_count)
        .unwrap_or(0);
    let media_urls = container
        .attributes_of(&POST_MEDIA, "src")
        .await
        .into_iter()
        .map(|url| url.trim().to_owned())
        .filter(|url| !url.is_empty())
        .collect();

    Ok(ScrapedPost {
        facebook_id,
        content,
        posted_at,
        likes_count,
        comments_count,
        media_urls,
    })
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Extracts the follower or following list.
///
/// The outer `Result` fails only when the page cannot be queried; each
/// entry carries its own result so one malformed entry does not hide the
/// others.
///
/// # Errors
///
/// Returns [`ScraperError`] if the page cannot be queried.
pub async fn extract_related_users(
    page: &dyn PageHandle,
    kind: RelationKind,
) -> Result<Vec<Result<ScrapedSocialUser, ScraperError>>, ScraperError> {
    let locator: &Locator = match kind {
        RelationKind::Follower => &FOLLOWER_ITEM,
        RelationKind::Following => &FOLLOWING_ITEM,
    };

    let items = page.elements(locator).await?;
    let mut users = Vec::with_capacity(items.len());
    for item in items {
        users.push(extract_social_user(item.as_ref()).await);
    }
    Ok(users)
}

async fn extract_social_user(item: &dyn ElementHandle) -> Result<ScrapedSocialUser, ScraperError> {
    let facebook_id = item
        .attribute(USER_ID_ATTR)
        .await
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ScraperError::extraction("user id", format!("missing {USER_ID_ATTR}")))?;

    Ok(ScrapedSocialUser {
        facebook_id,
        name: item.text_of(&USER_NAME).await.unwrap_or_default(),
        profile_pic_url: item
            .attribute_of(&USER_AVATAR, "src")
            .await
            .unwrap_or_default(),
    })
}

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

/// Parses a displayed count such as `"5,000 followers"`, `"1.2K"` or `"3M"`.
#[must_use]
pub fn parse_count(text: &str) -> Option<i64> {
    let caps = COUNT_RE.captures(text)?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        Some(s) if s == "b" => 1_000_000_000.0,
        _ => 1.0,
    };

    #[allow(clippy::cast_possible_truncation)]
    Some((number * multiplier).round() as i64)
}

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let secs = raw.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
