//! Application error types
//! Mission: Translate every failure mode in the scoring pipeline into the
//! right HTTP response, and nothing else.

use axum::{http::StatusCode, response::IntoResponse, response::Json, response::Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the scoring core.
///
/// `DataQuality` is not a failure: it is carried alongside a decision as a
/// reason code and never reaches this type. Everything here aborts the
/// request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("schema violation: {0}")]
    Schema(String),

    #[error("missing or malformed authorization token")]
    Unauthorized,

    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("not found")]
    NotFound,

    #[error("request deadline exceeded")]
    Timeout,

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Schema(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::TenantMismatch => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            AppError::Store(err) => {
                tracing::error!(error = %err, "store failure during scoring request");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
