//! HTTP routes
//!
//! Everything except `/health` and the sign-up/sign-in endpoints sits
//! behind [`require_auth`].

pub mod auth;
pub mod blobs;
pub mod content;

use axum::extract::DefaultBodyLimit;
use axum::response::Json as ResponseJson;
use axum::routing::{get, patch, post};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiResponse;
use crate::middleware::require_auth;
use crate::state::AppState;

/// GET /health
pub async fn health() -> ResponseJson<ApiResponse<&'static str>> {
    ResponseJson(ApiResponse::success("ok"))
}

/// Full application router
pub fn router(state: AppState) -> Router {
    // Room for every file field of the largest form
    let body_limit = usize::try_from(state.config.max_blob_size)
        .unwrap_or(usize::MAX)
        .saturating_mul(6);

    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/sign-up", post(auth::sign_up))
        .route("/auth/sign-in", post(auth::sign_in));

    let protected = Router::new()
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/auth/me", get(auth::me))
        .route("/content/summary", get(content::summary))
        .route(
            "/content/{content_type}",
            get(content::list).post(content::create),
        )
        .route("/content/{content_type}/form", get(content::form))
        .route(
            "/content/{content_type}/{id}",
            patch(content::update).delete(content::delete),
        )
        .route("/blobs/{*path}", get(blobs::fetch))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
