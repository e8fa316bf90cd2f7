//! Error types for rubric-server.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Service errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MultipartError> for ServiceError {
    fn from(err: MultipartError) -> Self {
        ServiceError::Upload(err.body_text())
    }
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServiceError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServiceError::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            ServiceError::Upload(_) => (StatusCode::BAD_REQUEST, "UPLOAD_FAILED"),
            ServiceError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ServiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code = code, error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "error": ApiError {
                code: code.to_string(),
                message: self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
