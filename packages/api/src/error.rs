// ABOUTME: API error type and structured error responses
// ABOUTME: Maps review failures to HTTP status codes with machine-readable codes and a request id

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use hellafresh_review::ReviewError;

/// Error type returned by every handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("Unauthorized access")]
    Unauthorized { message: String },

    #[error(transparent)]
    Review(#[from] ReviewError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Structured error response format for API consistency
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorDetail,
    request_id: String,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub(crate) fn to_status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Review(review_error) => match review_error {
                ReviewError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                ReviewError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                ReviewError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                ReviewError::TermNotPending { .. } => (StatusCode::CONFLICT, "TERM_NOT_PENDING"),
                ReviewError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION")
                }
                ReviewError::DeadlineExceeded => (StatusCode::REQUEST_TIMEOUT, "DEADLINE_EXCEEDED"),
                ReviewError::InvalidPolicy(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
                }
                ReviewError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
        }
    }

    /// User-facing message; storage failures are never described
    pub(crate) fn to_user_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => format!("Malformed request: {}", msg),
            ApiError::Unauthorized { message } => message.clone(),
            ApiError::Review(review_error) => match review_error {
                ReviewError::NotFound(id) => format!("Term '{}' not found", id),
                ReviewError::Validation(e) => format!("Validation failed: {}", e),
                ReviewError::Conflict(_) => "Submission collides with existing terms".to_string(),
                ReviewError::TermNotPending { status } => {
                    format!("Term is no longer open for review (status: {})", status)
                }
                ReviewError::InvalidTransition { from, to } => {
                    format!("Term cannot move from {} to {}", from, to)
                }
                ReviewError::DeadlineExceeded => {
                    "The request took too long and was not applied".to_string()
                }
                ReviewError::InvalidPolicy(_) => "Server configuration error".to_string(),
                ReviewError::Storage(_) => "Data storage error".to_string(),
            },
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::Review(ReviewError::Conflict(check)) => serde_json::to_value(check).ok(),
            ApiError::Review(ReviewError::Validation(e)) => {
                Some(serde_json::json!({ "field": e.field() }))
            }
            ApiError::Review(ReviewError::TermNotPending { status }) => {
                Some(serde_json::json!({ "status": status }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let (status_code, error_code) = self.to_status_and_code();

        match &self {
            ApiError::Review(ReviewError::Storage(storage_err)) => {
                error!(
                    request_id = %request_id,
                    storage_error = %storage_err,
                    "Storage system error"
                );
            }
            ApiError::Review(ReviewError::InvalidPolicy(msg)) => {
                error!(
                    request_id = %request_id,
                    config_error = %msg,
                    "Configuration error"
                );
            }
            ApiError::Unauthorized { .. } => {
                warn!(
                    request_id = %request_id,
                    audit = true,
                    "Unauthorized request"
                );
            }
            _ => {
                info!(
                    request_id = %request_id,
                    error_code = %error_code,
                    error = %self,
                    "API error response"
                );
            }
        }

        let error_response = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: error_code.to_string(),
                message: self.to_user_message(),
                details: self.details(),
            },
            request_id,
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
