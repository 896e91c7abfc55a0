//! The persistence seam the resolver and acquisition engine write through.

use async_trait::async_trait;
use pagescope_core::{NewPage, NewPost, NewSocialUser, Profile, RelationKind};
use pagescope_db::DbError;
use sqlx::PgPool;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be queried.
    async fn find_profile(&self, username: &str) -> Result<Option<Profile>, DbError>;

    /// Upserts a page and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    async fn upsert_page(&self, page: &NewPage) -> Result<i64, DbError>;

    /// Upserts a post under `page_id` and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MisalignedMedia`] for misaligned media lists, or
    /// another [`DbError`] if the upsert fails.
    async fn upsert_post(&self, page_id: i64, post: &NewPost) -> Result<i64, DbError>;

    /// Upserts a social user and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    async fn upsert_social_user(&self, user: &NewSocialUser) -> Result<i64, DbError>;

    /// Adds the user to the page's `kind` set; linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    async fn link_relation(
        &self,
        page_id: i64,
        user_id: i64,
        kind: RelationKind,
    ) -> Result<(), DbError>;
}

/// [`ProfileStore`] over the Postgres pool.
#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_profile(&self, username: &str) -> Result<Option<Profile>, DbError> {
        pagescope_db::load_profile(&self.pool, username).await
    }

    async fn upsert_page(&self, page: &NewPage) -> Result<i64, DbError> {
        Ok(pagescope_db::upsert_page(&self.pool, page).await?.id)
    }

    async fn upsert_post(&self, page_id: i64, post: &NewPost) -> Result<i64, DbError> {
        Ok(pagescope_db::upsert_post(&self.pool, page_id, post).await?.id)
    }

    async fn upsert_social_user(&self, user: &NewSocialUser) -> Result<i64, DbError> {
        Ok(pagescope_db::upsert_social_user(&self.pool, user).await?.id)
    }

    async fn link_relation(
        &self,
        page_id: i64,
        user_id: i64,
        kind: RelationKind,
    ) -> Result<(), DbError> {
        pagescope_db::link_social_user(&self.pool, page_id, user_id, kind).await?;
        Ok(())
    }
}
