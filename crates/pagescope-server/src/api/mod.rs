mod profiles;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use pagescope_resolver::{ResolveError, Resolver};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};
use crate::summary::Summarizer;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub resolver: Arc<Resolver>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// One page of a listing.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" => StatusCode::BAD_REQUEST,
            "acquisition_failed" | "summary_failed" => StatusCode::BAD_GATEWAY,
            "store_unavailable" | "summary_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// `page`/`page_size` query parameters shared by every listing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(super) struct PageParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageParams {
    /// 1-based page number.
    pub(super) fn page(self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub(super) fn page_size(self) -> i64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub(super) fn offset(self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }
}

pub(super) fn map_resolve_error(request_id: String, error: &ResolveError) -> ApiError {
    let code = match error {
        ResolveError::InvalidIdentifier(_) => "bad_request",
        ResolveError::NotFoundUpstream { .. } => "not_found",
        ResolveError::Acquisition { .. } => "acquisition_failed",
        ResolveError::StoreUnavailable(_) => "store_unavailable",
        ResolveError::Internal(_) => "internal_error",
    };
    match error {
        ResolveError::Internal(_) | ResolveError::StoreUnavailable(_) => {
            tracing::error!(error = %error, "profile lookup failed");
        }
        _ => tracing::warn!(error = %error, "profile lookup failed"),
    }
    ApiError::new(request_id, code, error.to_string())
}

pub(super) fn map_db_error(request_id: String, error: &pagescope_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "store_unavailable", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/profiles", get(profiles::search_profiles))
        .route("/api/v1/profiles/{identifier}", get(profiles::get_profile))
        .route(
            "/api/v1/profiles/{identifier}/posts",
            get(profiles::list_posts),
        )
        .route(
            "/api/v1/profiles/{identifier}/followers",
            get(profiles::list_followers),
        )
        .route(
            "/api/v1/profiles/{identifier}/following",
            get(profiles::list_following),
        )
        .route(
            "/api/v1/profiles/{identifier}/summary",
            get(profiles::get_summary),
        )
        .route(
            "/api/v1/profiles/{identifier}/refresh",
            post(profiles::refresh_profile),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match pagescope_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests;
