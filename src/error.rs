//! Error types and Axum response conversions.
//!
//! Every error body has the shape `{"success": false, "error": "..."}`.
//! Authentication and pagination failures also carry a `kind` tag so
//! clients can tell a retryable failure from one that needs a new challenge.

use crate::auth::protocol::{AuthError, AuthErrorKind};
use crate::pager::PagerError;
use crate::storage::db::DbError;
use crate::storage::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Pager(#[from] PagerError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, kind) = match &self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Unavailable(msg) => {
                tracing::error!(error = %msg, "Backing store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                    None,
                )
            }
            AppError::Auth(err) => {
                let kind = err.kind();
                let (status, message) = match kind {
                    AuthErrorKind::InvalidAddress | AuthErrorKind::MalformedSignature => {
                        (StatusCode::BAD_REQUEST, err.to_string())
                    }
                    AuthErrorKind::NoChallengeFound
                    | AuthErrorKind::ChallengeExpired
                    | AuthErrorKind::SignatureMismatch => {
                        (StatusCode::UNAUTHORIZED, err.to_string())
                    }
                    AuthErrorKind::StoreUnavailable => {
                        tracing::error!(error = %err, "Challenge store unavailable");
                        (
                            StatusCode::SERVICE_UNAVAILABLE,
                            "Authentication service temporarily unavailable".to_string(),
                        )
                    }
                    AuthErrorKind::Internal => {
                        tracing::error!(error = %err, "Authentication error");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Internal server error".to_string(),
                        )
                    }
                };
                (status, message, Some(json!(kind)))
            }
            AppError::Pager(err) => match err {
                PagerError::InvalidLimit => (
                    StatusCode::BAD_REQUEST,
                    err.to_string(),
                    Some(json!("InvalidLimit")),
                ),
                PagerError::CursorStale(_) => (
                    StatusCode::CONFLICT,
                    err.to_string(),
                    Some(json!("PaginationCursorStale")),
                ),
                PagerError::Store(msg) => {
                    tracing::error!(error = %msg, "Task store error during paging");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                        None,
                    )
                }
            },
        };

        let body = match kind {
            Some(kind) => json!({ "success": false, "error": message, "kind": kind }),
            None => json!({ "success": false, "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

// Convenience conversions from common error types
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidTask(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(format!("Database error: {}", other)),
        }
    }
}
