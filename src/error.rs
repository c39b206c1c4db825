//! Hub error types with HTTP status code mapping.
//!
//! [`HubError`] is the central error type. Each variant maps to a numeric
//! code and an HTTP status so that the producer REST API can render it as a
//! structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: message type must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Hub error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status                  |
/// |-----------|---------------|------------------------------|
/// | 1000–1999 | Validation    | 400 Bad Request              |
/// | 3000–3999 | Availability  | 503 Service Unavailable      |
/// | 4000–4999 | Payload       | 422 Unprocessable Entity     |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The message envelope could not be encoded. Nothing was delivered.
    #[error("envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The dispatch loop is no longer running.
    #[error("hub is not running")]
    HubStopped,

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Too many broadcasts are already waiting for the dispatch loop.
    #[error("hub is overloaded; broadcast rejected")]
    Overloaded,
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::HubStopped => 3001,
            Self::Overloaded => 3002,
            Self::Serialization(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::HubStopped | Self::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
