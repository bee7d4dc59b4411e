use axum::extract::multipart::MultipartError;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

use crate::ocr::OcrError;

#[derive(Debug, ThisError)]
pub enum ExpoError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("{0}")]
    Validation(String),

    #[error("Duplicate contact by fields: {}", .0.join(", "))]
    DuplicateContact(Vec<&'static str>),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("File too large. Maximum size: {max_mb}MB")]
    FileTooLarge { max_mb: u64 },

    #[error("File type not allowed. Allowed: {0}")]
    UnsupportedFileType(String),

    #[error("Too many OCR requests; retry later")]
    RateLimited,

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors worth another attempt against an upstream service.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ExpoError {
    fn is_retryable(&self) -> bool {
        match self {
            ExpoError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ExpoError::UpstreamStatus(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl IntoResponse for ExpoError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message, fields) = match self {
            ExpoError::DatabaseError(_)
            | ExpoError::Io(_)
            | ExpoError::Spreadsheet(_)
            | ExpoError::Join(_)
            | ExpoError::Config(_) => {
                error!(error = %self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred.".to_string(),
                    None,
                )
            }
            ExpoError::JsonError(ref e) => (
                StatusCode::BAD_REQUEST,
                "INVALID_JSON",
                e.to_string(),
                None,
            ),
            ExpoError::Multipart(ref e) => (e.status(), "INVALID_MULTIPART", e.body_text(), None),
            ExpoError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            ExpoError::DuplicateContact(ref fields) => (
                StatusCode::BAD_REQUEST,
                "DUPLICATE_CONTACT",
                self.to_string(),
                Some(fields.clone()),
            ),
            ExpoError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string(), None),
            ExpoError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                self.to_string(),
                None,
            ),
            ExpoError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.to_string(), None),
            ExpoError::FileTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                self.to_string(),
                None,
            ),
            ExpoError::UnsupportedFileType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "INVALID_FILE_TYPE",
                self.to_string(),
                None,
            ),
            ExpoError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT",
                self.to_string(),
                None,
            ),
            ExpoError::Ocr(ref e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    error!(error = %e, "OCR failed");
                }
                (status, "OCR_ERROR", e.to_string(), None)
            }
            ExpoError::Reqwest(_) | ExpoError::UpstreamStatus(_) => {
                error!(error = %self, "upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "BAD_GATEWAY",
                    "Upstream service is unavailable.".to_string(),
                    None,
                )
            }
        };
        let body = ApiErrorResponse {
            error: ApiErrorBody {
                code: code.to_string(),
                message,
                fields,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<&'static str>>,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
