//! Error types for rollcall-collator

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the ledger, the stream pipeline and the collator
#[derive(Debug, Error)]
pub enum CollatorError {
    /// Roster document could not be parsed; the ledger was left unchanged
    #[error("Malformed roster: {0}")]
    MalformedRoster(#[source] serde_json::Error),

    /// Snapshot file exists but could not be parsed; nothing was loaded
    #[error("Corrupt snapshot {}: {source}", .path.display())]
    SnapshotCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Start-time connectivity probe against a detection source failed
    #[error("Source unreachable: {url}: {reason}")]
    SourceUnreachable { url: String, reason: String },

    /// A single detection line could not be decoded
    #[error("Malformed detection line: {0}")]
    Decode(#[source] serde_json::Error),

    /// Invalid caller input (empty URL, zero interval, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for collator operations
pub type Result<T> = std::result::Result<T, CollatorError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Collator(#[from] CollatorError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Collator(err) => {
                let (status, code) = match &err {
                    CollatorError::MalformedRoster(_) => (StatusCode::BAD_REQUEST, "MALFORMED_ROSTER"),
                    CollatorError::SourceUnreachable { .. } => {
                        (StatusCode::BAD_REQUEST, "SOURCE_UNREACHABLE")
                    }
                    CollatorError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                    CollatorError::Decode(_) => (StatusCode::BAD_REQUEST, "DECODE_ERROR"),
                    CollatorError::SnapshotCorrupt { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "SNAPSHOT_CORRUPT")
                    }
                    CollatorError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                    CollatorError::Json(_) | CollatorError::Internal(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, code, err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
