//! Database operations for the `posts` table.

use chrono::{DateTime, Utc};
use pagescope_core::{NewPost, Post};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub page_id: i64,
    pub facebook_id: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub media_urls: Vec<String>,
    pub media_s3_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            page_id: row.page_id,
            facebook_id: row.facebook_id,
            content: row.content,
            posted_at: row.posted_at,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
            media_urls: row.media_urls,
            media_s3_urls: row.media_s3_urls,
        }
    }
}

/// Upserts a post keyed by its source `facebook_id` and scopes it to
/// `page_id`.
///
/// A conflicting row is fully replaced, including `page_id`, so a post that
/// moved between pages follows the latest scrape.
///
/// # Errors
///
/// Returns [`DbError::MisalignedMedia`] without touching the database when
/// `media_s3_urls` is non-empty and not the same length as `media_urls`.
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_post(pool: &PgPool, page_id: i64, post: &NewPost) -> Result<PostRow, DbError> {
    if !post.media_aligned() {
        return Err(DbError::MisalignedMedia {
            facebook_id: post.facebook_id.clone(),
            media: post.media_urls.len(),
            offloaded: post.media_s3_urls.len(),
        });
    }

    let row = sqlx::query_as::<_, PostRow>(
        "INSERT INTO posts \
             (page_id, facebook_id, content, posted_at, likes_count, comments_count, \
              media_urls, media_s3_urls) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (facebook_id) DO UPDATE SET \
             page_id        = EXCLUDED.page_id, \
             content        = EXCLUDED.content, \
             posted_at      = EXCLUDED.posted_at, \
             likes_count    = EXCLUDED.likes_count, \
             comments_count = EXCLUDED.comments_count, \
             media_urls     = EXCLUDED.media_urls, \
             media_s3_urls  = EXCLUDED.media_s3_urls, \
             updated_at     = NOW() \
         RETURNING id, page_id, facebook_id, content, posted_at, likes_count, \
                   comments_count, media_urls, media_s3_urls, created_at, updated_at",
    )
    .bind(page_id)
    .bind(&post.facebook_id)
    .bind(&post.content)
    .bind(post.posted_at)
    .bind(post.likes_count)
    .bind(post.comments_count)
    .bind(&post.media_urls)
    .bind(&post.media_s3_urls)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// List a page's posts, newest first.
///
/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn list_posts_for_page(
    pool: &PgPool,
    page_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostRow>, DbError> {
    Ok(sqlx::query_as::<_, PostRow>(
        "SELECT id, page_id, facebook_id, content, posted_at, likes_count, comments_count, \
                media_urls, media_s3_urls, created_at, updated_at \
         FROM posts \
         WHERE page_id = $1 \
         ORDER BY posted_at DESC, id DESC \
         LIMIT $2 OFFSET $3",
    )
    .bind(page_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}

/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn count_posts_for_page(pool: &PgPool, page_id: i64) -> Result<i64, DbError> {
    Ok(
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE page_id = $1")
            .bind(page_id)
            .fetch_one(pool)
            .await?,
    )
}
