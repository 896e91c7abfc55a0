use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use pagescope_core::{Post, Profile, RelationKind, SocialUser};
use pagescope_db::{PageRow, PageSearchFilters};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_db_error, map_resolve_error, ApiError, ApiResponse, AppState, PageParams, Paginated,
    ResponseMeta,
};

/// Stored page as listed by search; relations and posts are not embedded.
#[derive(Debug, Serialize)]
pub(super) struct PageItem {
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
}

impl From<PageRow> for PageItem {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            facebook_id: row.facebook_id,
            name: row.name,
            url: row.url,
            profile_pic_url: row.profile_pic_url,
            profile_pic_s3_url: row.profile_pic_s3_url,
            email: row.email,
            website: row.website,
            category: row.category,
            followers_count: row.followers_count,
            likes_count: row.likes_count,
            created_at: row.created_at,
            last_scraped: row.last_scraped,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct SearchParams {
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
    pub category: Option<String>,
    pub name: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SummaryData {
    pub summary: String,
}

pub(super) async fn get_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
) -> Result<Json<ApiResponse<Profile>>, ApiError> {
    let profile = resolve(&state, &req_id, &identifier).await?;
    Ok(Json(ApiResponse {
        data: profile,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn refresh_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
) -> Result<Json<ApiResponse<Profile>>, ApiError> {
    let profile = state
        .resolver
        .refresh(&identifier)
        .await
        .map_err(|e| map_resolve_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse {
        data: profile,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn search_profiles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Paginated<PageItem>>>, ApiError> {
    let paging = PageParams {
        page: params.page,
        page_size: params.page_size,
    };
    let filters = PageSearchFilters {
        min_followers: params.min_followers,
        max_followers: params.max_followers,
        category: params.category.as_deref().filter(|s| !s.is_empty()),
        name: params.name.as_deref().filter(|s| !s.is_empty()),
    };

    let rows = pagescope_db::search_pages(&state.pool, &filters, paging.page_size(), paging.offset())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let total = pagescope_db::count_pages(&state.pool, &filters)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: Paginated {
            items: rows.into_iter().map(PageItem::from).collect(),
            page: paging.page(),
            page_size: paging.page_size(),
            total,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
    Query(paging): Query<PageParams>,
) -> Result<Json<ApiResponse<Paginated<Post>>>, ApiError> {
    let profile = resolve(&state, &req_id, &identifier).await?;

    let rows = pagescope_db::list_posts_for_page(
        &state.pool,
        profile.id,
        paging.page_size(),
        paging.offset(),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let total = pagescope_db::count_posts_for_page(&state.pool, profile.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: Paginated {
            items: rows.into_iter().map(Post::from).collect(),
            page: paging.page(),
            page_size: paging.page_size(),
            total,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_followers(
    state: State<AppState>,
    req_id: Extension<RequestId>,
    identifier: Path<String>,
    paging: Query<PageParams>,
) -> Result<Json<ApiResponse<Paginated<SocialUser>>>, ApiError> {
    list_related(state, req_id, identifier, paging, RelationKind::Follower).await
}

pub(super) async fn list_following(
    state: State<AppState>,
    req_id: Extension<RequestId>,
    identifier: Path<String>,
    paging: Query<PageParams>,
) -> Result<Json<ApiResponse<Paginated<SocialUser>>>, ApiError> {
    list_related(state, req_id, identifier, paging, RelationKind::Following).await
}

async fn list_related(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
    Query(paging): Query<PageParams>,
    kind: RelationKind,
) -> Result<Json<ApiResponse<Paginated<SocialUser>>>, ApiError> {
    let profile = resolve(&state, &req_id, &identifier).await?;

    let rows = pagescope_db::list_related_users(
        &state.pool,
        profile.id,
        kind,
        paging.page_size(),
        paging.offset(),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let total = pagescope_db::count_related_users(&state.pool, profile.id, kind)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: Paginated {
            items: rows.into_iter().map(SocialUser::from).collect(),
            page: paging.page(),
            page_size: paging.page_size(),
            total,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
) -> Result<Json<ApiResponse<SummaryData>>, ApiError> {
    let Some(summarizer) = state.summarizer.clone() else {
        return Err(ApiError::new(
            req_id.0,
            "summary_unavailable",
            "no summary API is configured",
        ));
    };

    let profile = resolve(&state, &req_id, &identifier).await?;
    let summary = summarizer.summarize(&profile).await.map_err(|e| {
        tracing::warn!(identifier = %profile.username, error = %e, "summary failed");
        ApiError::new(req_id.0.clone(), "summary_failed", e.to_string())
    })?;

    Ok(Json(ApiResponse {
        data: SummaryData { summary },
        meta: ResponseMeta::new(req_id.0),
    }))
}

async fn resolve(state: &AppState, req_id: &RequestId, identifier: &str) -> Result<Profile, ApiError> {
    state
        .resolver
        .resolve(identifier)
        .await
        .map_err(|e| map_resolve_error(req_id.0.clone(), &e))
}
