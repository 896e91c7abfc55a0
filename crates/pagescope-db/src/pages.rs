//! Database operations for the `pages` table.

use chrono::{DateTime, Utc};
use pagescope_core::NewPage;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::DbError;

const PAGE_COLUMNS: &str = "id, username, facebook_id, name, url, profile_pic_url, \
     profile_pic_s3_url, email, website, category, followers_count, likes_count, \
     created_at, last_scraped, updated_at";

/// A row from the `pages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PageRow {
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
    /// Creation time asserted by the source.
    pub created_at: DateTime<Utc>,
    pub last_scraped: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for [`search_pages`] and [`count_pages`]. All are optional and
/// combined with `AND`.
#[derive(Debug, Clone, Default)]
pub struct PageSearchFilters<'a> {
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
    /// Exact category match.
    pub category: Option<&'a str>,
    /// Case-insensitive substring match on the display name.
    pub name: Option<&'a str>,
}

/// Get a page by its username (the resolver's identifier).
///
/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn get_page_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<PageRow>, DbError> {
    Ok(
        sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await?,
    )
}

/// Upserts a page keyed by `username`.
///
/// Every scalar field is replaced by the incoming value on conflict, except
/// `last_scraped`, which keeps the later of the stored and incoming values so
/// that a slow, older acquisition finishing late cannot move it backwards.
///
/// Returns the row as stored after the upsert.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails, including a uniqueness
/// violation when `facebook_id` already belongs to a different username.
pub async fn upsert_page(pool: &PgPool, page: &NewPage) -> Result<PageRow, DbError> {
    let row = sqlx::query_as::<_, PageRow>(&format!(
        "INSERT INTO pages \
             (username, facebook_id, name, url, profile_pic_url, profile_pic_s3_url, \
              email, website, category, followers_count, likes_count, created_at, last_scraped) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, NOW()), $13) \
         ON CONFLICT (username) DO UPDATE SET \
             facebook_id        = EXCLUDED.facebook_id, \
             name               = EXCLUDED.name, \
             url                = EXCLUDED.url, \
             profile_pic_url    = EXCLUDED.profile_pic_url, \
             profile_pic_s3_url = EXCLUDED.profile_pic_s3_url, \
             email              = EXCLUDED.email, \
             website            = EXCLUDED.website, \
             category           = EXCLUDED.category, \
             followers_count    = EXCLUDED.followers_count, \
             likes_count        = EXCLUDED.likes_count, \
             created_at         = COALESCE($12, pages.created_at), \
             last_scraped       = GREATEST(pages.last_scraped, EXCLUDED.last_scraped), \
             updated_at         = NOW() \
         RETURNING {PAGE_COLUMNS}"
    ))
    .bind(&page.username)
    .bind(&page.facebook_id)
    .bind(&page.name)
    .bind(&page.url)
    .bind(&page.profile_pic_url)
    .bind(&page.profile_pic_s3_url)
    .bind(&page.email)
    .bind(&page.website)
    .bind(&page.category)
    .bind(page.followers_count)
    .bind(page.likes_count)
    .bind(page.created_at)
    .bind(page.last_scraped)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

fn push_filters<'q>(qb: &mut QueryBuilder<'q, Postgres>, filters: &PageSearchFilters<'q>) {
    qb.push(" WHERE TRUE");
    if let Some(min) = filters.min_followers {
        qb.push(" AND followers_count >= ").push_bind(min);
    }
    if let Some(max) = filters.max_followers {
        qb.push(" AND followers_count <= ").push_bind(max);
    }
    if let Some(category) = filters.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(name) = filters.name {
        qb.push(" AND name ILIKE ")
            .push_bind(format!("%{}%", escape_like(name)))
            .push(" ESCAPE '\\'");
    }
}

/// Search stored pages, ordered by `followers_count DESC, id ASC`.
///
/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn search_pages(
    pool: &PgPool,
    filters: &PageSearchFilters<'_>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PageRow>, DbError> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PAGE_COLUMNS} FROM pages"));
    push_filters(&mut qb, filters);
    qb.push(" ORDER BY followers_count DESC, id ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    Ok(qb.build_query_as::<PageRow>().fetch_all(pool).await?)
}

/// Count pages matching the same filters as [`search_pages`].
///
/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn count_pages(pool: &PgPool, filters: &PageSearchFilters<'_>) -> Result<i64, DbError> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM pages");
    push_filters(&mut qb, filters);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

/// Usernames of pages whose `last_scraped` is older than `older_than`,
/// stalest first.
///
/// Used by the scheduled refresh job.
///
/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn list_stale_page_usernames(
    pool: &PgPool,
    older_than: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<String>, DbError> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT username FROM pages WHERE last_scraped < $1 \
         ORDER BY last_scraped ASC, id ASC LIMIT $2",
    )
    .bind(older_than)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
