//! Error types for fieldcheck-api
//!
//! Maps the shared error taxonomy onto HTTP responses. Validation failures
//! carry a structured per-field list; integrity violations are logged and
//! surfaced as opaque 500s.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fieldcheck_common::FieldError;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found, or outside the caller's organization (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed request that never reached validation (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Structured validation failure (400)
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Natural-key conflict, e.g. duplicate questionnaire version (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller identity missing or unknown (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<fieldcheck_common::Error> for ApiError {
    fn from(err: fieldcheck_common::Error) -> Self {
        use fieldcheck_common::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Validation(fields) => ApiError::Validation(fields),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Integrity(msg) => {
                // validation gap relative to the schema; keep the detail in
                // the log, not in the response
                tracing::error!("integrity violation after validation passed: {}", msg);
                ApiError::Internal("internal error".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::from(fieldcheck_common::Error::Database(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": { "code": "NOT_FOUND", "message": msg } }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": { "code": "BAD_REQUEST", "message": msg } }),
            ),
            ApiError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": { "code": "VALIDATION", "campos": fields } }),
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                json!({ "error": { "code": "CONFLICT", "message": msg } }),
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": { "code": "UNAUTHORIZED", "message": msg } }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": { "code": "INTERNAL_ERROR", "message": msg } }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
