//! HTTP error envelopes
//!
//! | Error              | Status        | Body                                              |
//! |--------------------|---------------|---------------------------------------------------|
//! | missing key        | 400           | `{valid: false, message}`                         |
//! | invalid body       | 400           | `{error}`                                         |
//! | validation_failed  | 400           | `{success: false, error, message}`                |
//! | conflict           | 200           | `{success: false, error, message, retry: true}`   |
//! | rate_limited       | 429           | `{success: false, error, message, retry_after}`   |
//! | not configured     | 500           | `{error, message}`                                |
//! | upstream           | passthrough   | `{error, message}`                                |
//! | internal_error     | 500           | `{valid: false, error, message}` (generic)        |

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;
use tracing::{error, warn};

use crate::stores::StoreError;

pub const MISSING_KEY_MESSAGE: &str = "Missing license key parameter";
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body. Expected licenses array.";
const INTERNAL_MESSAGE: &str = "Internal server error";

/// API error types for HTTP responses
#[derive(Debug)]
pub enum ApiError {
    MissingLicenseKey,
    InvalidBody(String),
    ValidationFailed(String),
    Conflict(String),
    RateLimited { retry_after_secs: u64 },
    NotConfigured(String),
    Upstream { status: u16, message: String },
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => ApiError::Conflict(message),
            StoreError::RateLimited { retry_after_secs } => ApiError::RateLimited { retry_after_secs },
            StoreError::Upstream { status, message } => ApiError::Upstream { status, message },
            StoreError::NotConfigured(message) => ApiError::NotConfigured(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<licman_common::Error> for ApiError {
    fn from(err: licman_common::Error) -> Self {
        match err {
            licman_common::Error::ValidationFailed(message) => ApiError::ValidationFailed(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingLicenseKey => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "valid": false, "message": MISSING_KEY_MESSAGE })),
            )
                .into_response(),
            ApiError::InvalidBody(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::ValidationFailed(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": "validation_failed",
                    "message": message,
                })),
            )
                .into_response(),
            ApiError::Conflict(message) => {
                warn!(%message, "Write conflict reported to caller");
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": false,
                        "error": "conflict",
                        "message": "The stored licenses changed since they were read; resubmit to retry",
                        "retry": true,
                    })),
                )
                    .into_response()
            }
            ApiError::RateLimited { retry_after_secs } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "success": false,
                        "error": "rate_limited",
                        "message": "Upstream rate limit reached",
                        "retry_after": retry_after_secs,
                    })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            ApiError::NotConfigured(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": message,
                    "message": "Configure the remote repository credentials (GITHUB_TOKEN) to enable writes",
                })),
            )
                .into_response(),
            ApiError::Upstream { status, message } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    status,
                    Json(json!({
                        "error": "Failed to write to remote repository",
                        "message": message,
                    })),
                )
                    .into_response()
            }
            ApiError::Internal(detail) => {
                error!(%detail, "Internal error");
                internal_error_response()
            }
        }
    }
}

fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "valid": false,
            "error": "internal_error",
            "message": INTERNAL_MESSAGE,
        })),
    )
        .into_response()
}

/// Panic handler for `CatchPanicLayer`; the payload is logged, never returned.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(%detail, "Handler panicked");
    internal_error_response()
}
