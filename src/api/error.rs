use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::models::ErrorResponse;
use crate::downloader::ExtractError;
use crate::library::LibraryError;
use crate::pipeline::IngestError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    InvalidUrl(String),
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("{0}")]
    Duplicate(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    DownloadFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) | ApiError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Duplicate(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DownloadFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::InvalidUrl(_) => "INVALID_URL",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::Duplicate(_) => "DUPLICATE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DownloadFailed(_) => "DOWNLOAD_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(value: IngestError) -> Self {
        match value {
            IngestError::InvalidUrl(message) => ApiError::InvalidUrl(message),
            IngestError::Metadata(ExtractError::InvalidUrl(message)) => {
                ApiError::InvalidUrl(message)
            }
            e @ IngestError::Duplicate(_) => ApiError::Duplicate(e.to_string()),
            IngestError::NotFound(id) => ApiError::NotFound(format!("video {id}")),
            e @ (IngestError::Metadata(_) | IngestError::Download(_)) => {
                ApiError::DownloadFailed(e.to_string())
            }
            e @ (IngestError::Upload(_)
            | IngestError::Persistence(_)
            | IngestError::Library(_)) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<LibraryError> for ApiError {
    fn from(value: LibraryError) -> Self {
        match value {
            LibraryError::DuplicateUrl(url) => {
                ApiError::Duplicate(format!("Video already exists: {url}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(key) => ApiError::NotFound(format!("file {key}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
