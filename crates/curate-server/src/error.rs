//! API errors and the JSON envelope every route answers with

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use curate_core::{AuthError, BlobError, CurateError, StoreError, SuggestionError};
use curate_sync::{FieldError, PersistenceError, SyncError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Response body: `{ success, data?, message? }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error_with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: false,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Suggestion service unavailable: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        match self {
            ApiError::Validation(errors) => {
                (status, Json(ApiResponse::error_with_data("Validation failed", errors)))
                    .into_response()
            }
            other => (status, Json(ApiResponse::error(other.to_string()))).into_response(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::PermissionDenied(_) => ApiError::Unauthorized(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(_) => ApiError::NotFound(err.to_string()),
            BlobError::InvalidPath(_) => ApiError::BadRequest(err.to_string()),
            BlobError::TooLarge { .. } => ApiError::BadRequest(err.to_string()),
            BlobError::AlreadyExists(_) => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Upload { ref source, .. } => match source {
                BlobError::TooLarge { .. } | BlobError::InvalidPath(_) => {
                    ApiError::BadRequest(err.to_string())
                }
                _ => ApiError::Internal(err.to_string()),
            },
            PersistenceError::Write { source, .. } => source.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidSession => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::EmailTaken(_) => ApiError::Conflict(err.to_string()),
            AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => {
                ApiError::BadRequest(err.to_string())
            }
            AuthError::Backend(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<SuggestionError> for ApiError {
    fn from(err: SuggestionError) -> Self {
        match err {
            SuggestionError::Unsupported(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<CurateError> for ApiError {
    fn from(err: CurateError) -> Self {
        match err {
            CurateError::Store(e) => e.into(),
            CurateError::Blob(e) => e.into(),
            CurateError::Suggestion(e) => e.into(),
            CurateError::Auth(e) => e.into(),
            CurateError::ContentType(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
