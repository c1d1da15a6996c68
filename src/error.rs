// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
///
/// Every variant carries a human-readable message; `kind()` gives the
/// machine-checkable tag that ends up in the response body, so clients can
/// distinguish "re-authenticate" from "resync your revision counter" without
/// parsing prose.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    Internal(String),

    // 503 Service Unavailable (transient backing-store failure; the only
    // kind a caller may retry)
    StoreUnavailable(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthenticated(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict: append batch does not extend the stored stream
    RevisionConflict(String),

    // 422 Unprocessable: test results reference test cases of another problem
    SchemaMismatch(String),

    // 409 Conflict: an active quiz session already exists
    SessionAlreadyActive(String),

    // 409 Conflict: quiz session was already ended
    AlreadyEnded(String),
}

impl AppError {
    /// Machine-checkable error kind, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::RevisionConflict(_) => "revision_conflict",
            AppError::SchemaMismatch(_) => "schema_mismatch",
            AppError::SessionAlreadyActive(_) => "session_already_active",
            AppError::AlreadyEnded(_) => "already_ended",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message) = match self {
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Backing store temporarily unavailable".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::RevisionConflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::SchemaMismatch(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::SessionAlreadyActive(msg) => (StatusCode::CONFLICT, msg),
            AppError::AlreadyEnded(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into the matching `AppError` kind.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::StoreUnavailable(err.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
