//! API error handling for consistent JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::index::IndexError;

/// API error type that converts to JSON responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Internal error: {:#}", err);
        Self::internal(err.to_string())
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        let status = match &err {
            IndexError::ConcurrentUpdateRejected { .. } => StatusCode::CONFLICT,
            IndexError::QueryOnEmptyIndex => StatusCode::LOCKED,
            IndexError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IndexError::UploadRejected(_)
            | IndexError::SourceUnavailable(_)
            | IndexError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            IndexError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            IndexError::SourceFetch { .. }
            | IndexError::Transcription { .. }
            | IndexError::Embedding { .. }
            | IndexError::Merge { .. }
            | IndexError::Timeout { .. }
            | IndexError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
