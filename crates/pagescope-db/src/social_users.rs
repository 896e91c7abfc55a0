//! Database operations for `social_users` and the `page_relations` link
//! table.

use chrono::{DateTime, Utc};
use pagescope_core::{NewSocialUser, RelationKind, SocialUser};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `social_users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SocialUserRow {
    pub id: i64,
    pub facebook_id: String,
    pub name: String,
    pub profile_pic_url: String,
    pub profile_pic_s3_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SocialUserRow> for SocialUser {
    fn from(row: SocialUserRow) -> Self {
        Self {
            id: row.id,
            facebook_id: row.facebook_id,
            name: row.name,
            profile_pic_url: row.profile_pic_url,
            profile_pic_s3_url: row.profile_pic_s3_url,
        }
    }
}

/// Upserts a social user keyed by `facebook_id`.
///
/// A `None` offloaded avatar does not clear a previously stored one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_social_user(
    pool: &PgPool,
    user: &NewSocialUser,
) -> Result<SocialUserRow, DbError> {
    let row = sqlx::query_as::<_, SocialUserRow>(
        "INSERT INTO social_users (facebook_id, name, profile_pic_url, profile_pic_s3_url) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (facebook_id) DO UPDATE SET \
             name               = EXCLUDED.name, \
             profile_pic_url    = EXCLUDED.profile_pic_url, \
             profile_pic_s3_url = COALESCE(EXCLUDED.profile_pic_s3_url, social_users.profile_pic_s3_url), \
             updated_at         = NOW() \
         RETURNING id, facebook_id, name, profile_pic_url, profile_pic_s3_url, created_at, updated_at",
    )
    .bind(&user.facebook_id)
    .bind(&user.name)
    .bind(&user.profile_pic_url)
    .bind(&user.profile_pic_s3_url)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Adds `user_id` to the page's follower or following set.
///
/// Linking an already-linked pair is a no-op. Returns `true` when a new link
/// was created.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (e.g. unknown page or user).
pub async fn link_social_user(
    pool: &PgPool,
    page_id: i64,
    user_id: i64,
    kind: RelationKind,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO page_relations (page_id, social_user_id, kind) \
         VALUES ($1, $2, $3) \
         ON CONFLICT DO NOTHING",
    )
    .bind(page_id)
    .bind(user_id)
    .bind(kind.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Users linked to a page under `kind`, in link order.
///
/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn list_related_users(
    pool: &PgPool,
    page_id: i64,
    kind: RelationKind,
    limit: i64,
    offset: i64,
) -> Result<Vec<SocialUserRow>, DbError> {
    Ok(sqlx::query_as::<_, SocialUserRow>(
        "SELECT u.id, u.facebook_id, u.name, u.profile_pic_url, u.profile_pic_s3_url, \
                u.created_at, u.updated_at \
         FROM page_relations r \
         JOIN social_users u ON u.id = r.social_user_id \
         WHERE r.page_id = $1 AND r.kind = $2 \
         ORDER BY r.created_at ASC, u.id ASC \
         LIMIT $3 OFFSET $4",
    )
    .bind(page_id)
    .bind(kind.as_str())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}

/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn count_related_users(
    pool: &PgPool,
    page_id: i64,
    kind: RelationKind,
) -> Result<i64, DbError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM page_relations WHERE page_id = $1 AND kind = $2",
    )
    .bind(page_id)
    .bind(kind.as_str())
    .fetch_one(pool)
    .await?)
}
