//! Error types for the offline worker
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Worker Error Enum ==
/// Unified error type for the offline worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Generation was never opened
    #[error("Generation not found: {0}")]
    GenerationNotFound(String),

    /// Storage quota would be exceeded by a write
    #[error("Quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// Upstream unreachable or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// A manifest asset could not be fetched during install
    #[error("Install of '{generation}' failed on {asset}: {reason}")]
    InstallFailed {
        generation: String,
        asset: String,
        reason: String,
    },

    /// Durable backing store unavailable
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkerError::GenerationNotFound(_) => StatusCode::NOT_FOUND,
            WorkerError::QuotaExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
            WorkerError::Network(_) => StatusCode::BAD_GATEWAY,
            WorkerError::InstallFailed { .. } => StatusCode::BAD_GATEWAY,
            WorkerError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            WorkerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            WorkerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the offline worker.
pub type Result<T> = std::result::Result<T, WorkerError>;
