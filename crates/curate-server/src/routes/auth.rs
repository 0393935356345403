//! Sign-up, sign-in, sign-out and session lookup

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json as ResponseJson;
use axum::{Extension, Json};
use curate_core::{Session, User};
use serde::Deserialize;

use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// POST /auth/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Session>>), ApiError> {
    let session = state
        .auth
        .sign_up(&credentials.email, &credentials.password)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(session))))
}

/// POST /auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<ResponseJson<ApiResponse<Session>>, ApiError> {
    let session = state
        .auth
        .sign_in(&credentials.email, &credentials.password)
        .await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

/// POST /auth/sign-out
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.auth.sign_out(&session.token).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /auth/me
pub async fn me(Extension(session): Extension<Session>) -> ResponseJson<ApiResponse<User>> {
    ResponseJson(ApiResponse::success(session.user))
}
