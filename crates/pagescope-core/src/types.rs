use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scrape-time records
// ---------------------------------------------------------------------------

/// Profile-level fields extracted from a rendered source page, before any
/// media is offloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedProfile {
    /// The identifier the page was rendered for.
    pub username: String,
    /// Source-side numeric page id, when the page exposes one.
    pub facebook_id: Option<String>,
    pub name: String,
    /// URL the source settled on after redirects.
    pub url: String,
    pub profile_pic_url: String,
    pub email: Option<String>,
    pub website: Option<String>,
    pub category: String,
    pub followers_count: i64,
    pub likes_count: i64,
    /// Creation time asserted by the source, when it shows one.
    pub created_at: Option<DateTime<Utc>>,
}

/// A single post extracted from the page's post list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPost {
    pub facebook_id: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub likes_count: i64,
    pub comments_count: i64,
    /// Source media URLs in the order they appear in the post.
    pub media_urls: Vec<String>,
}

/// A user listed in one of the page's follower/following lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedSocialUser {
    pub facebook_id: String,
    pub name: String,
    pub profile_pic_url: String,
}

// ---------------------------------------------------------------------------
// Upsert inputs
// ---------------------------------------------------------------------------

/// Field set written by a page upsert. Every scalar is replaced on conflict,
/// except `last_scraped` which never moves backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub username: String,
    pub facebook_id: Option<String>,
    pub name: String,
    pub url: String,
    pub profile_pic_url: String,
    pub profile_pic_s3_url: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub category: String,
    pub followers_count: i64,
    pub likes_count: i64,
    /// `None` keeps the stored creation time, or falls back to the insert
    /// time for a new page.
    pub created_at: Option<DateTime<Utc>>,
    pub last_scraped: DateTime<Utc>,
}

impl NewPage {
    /// Combines scraped fields with the offloaded avatar URL.
    #[must_use]
    pub fn from_scraped(
        scraped: ScrapedProfile,
        profile_pic_s3_url: String,
        last_scraped: DateTime<Utc>,
    ) -> Self {
        Self {
            username: scraped.username,
            facebook_id: scraped.facebook_id,
            name: scraped.name,
            url: scraped.url,
            profile_pic_url: scraped.profile_pic_url,
            profile_pic_s3_url: Some(profile_pic_s3_url),
            email: scraped.email,
            website: scraped.website,
            category: scraped.category,
            followers_count: scraped.followers_count,
            likes_count: scraped.likes_count,
            created_at: scraped.created_at,
            last_scraped,
        }
    }
}

/// Field set written by a post upsert (full replace on conflict).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub facebook_id: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub media_urls: Vec<String>,
    /// Positionally aligned with `media_urls`; `""` marks a failed offload.
    pub media_s3_urls: Vec<String>,
}

impl NewPost {
    /// `true` when `media_s3_urls` is empty or matches `media_urls` one-to-one.
    #[must_use]
    pub fn media_aligned(&self) -> bool {
        self.media_s3_urls.is_empty() || self.media_s3_urls.len() == self.media_urls.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSocialUser {
    pub facebook_id: String,
    pub name: String,
    pub profile_pic_url: String,
    pub profile_pic_s3_url: Option<String>,
}

/// Which of the two page ↔ user relations a link belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Follower,
    Following,
}

impl RelationKind {
    /// Value stored in `page_relations.kind`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Follower => "follower",
            RelationKind::Following => "following",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Read model
// ---------------------------------------------------------------------------

/// Fully-populated profile as returned by the resolver and held in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub facebook_id: Option<String>,
    pub name: String,
    pub url: String,
    pub profile_pic_url: String,
    pub profile_pic_s3_url: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub category: String,
    pub followers_count: i64,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_scraped: DateTime<Utc>,
    /// Most recent posts first.
    pub posts: Vec<Post>,
    pub followers: Vec<SocialUser>,
    pub following: Vec<SocialUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub page_id: i64,
    pub facebook_id: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub media_urls: Vec<String>,
    pub media_s3_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialUser {
    pub id: i64,
    pub facebook_id: String,
    pub name: String,
    pub profile_pic_url: String,
    pub profile_pic_s3_url: Option<String>,
}
