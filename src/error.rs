use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MedimindError>;

/// Crate-wide error type. Model-layer failures are caught at call sites and
/// folded into fixed user-facing fallbacks; variants that reach the HTTP
/// boundary map onto a status code plus an `{ "error": ... }` body.
#[derive(Debug, Error)]
pub enum MedimindError {
    #[error("API key not configured on server.")]
    MissingApiKey,

    #[error("Upstream model call failed: {0}")]
    Upstream(String),

    #[error("Upstream response did not match the expected schema: {0}")]
    SchemaMismatch(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid action specified.")]
    UnknownAction(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Failed to create Redis pool: {0}")]
    PoolCreation(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MedimindError {
    fn status_code(&self) -> StatusCode {
        match self {
            MedimindError::InvalidDocument(_) | MedimindError::UnknownAction(_) => {
                StatusCode::BAD_REQUEST
            }
            MedimindError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MedimindError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
