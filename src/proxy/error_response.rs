//! Unified error response handling for the proxy service
//!
//! Every failure detected before response bytes reach the caller becomes a
//! JSON body of the form `{"error": CODE, "message": TEXT, ...context}`.

use crate::proxy::types::ProxyError;
use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use tracing::error;

/// Standard error response format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Short error code for programmatic handling
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Fields echoing the offending input
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: code.into(),
            message: message.into(),
            context: Map::new(),
        }
    }

    /// Attach a context field
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Convert to HTTP response with the given status
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Extension trait for consistent error formatting
pub trait ErrorResponseExt {
    /// Convert to standardized error response
    fn to_error_response(&self) -> ErrorResponse;

    /// Get the appropriate HTTP status code
    fn status_code(&self) -> StatusCode;
}

impl ErrorResponseExt for ProxyError {
    fn to_error_response(&self) -> ErrorResponse {
        use ProxyError::*;

        match self {
            MissingTarget => ErrorResponse::new(
                "MISSING_TARGET",
                "Request path must contain a percent-encoded absolute target URL",
            )
            .with_context("example", "/https%3A%2F%2Fapi.example.com%2Fv1%2Fitems"),
            InvalidEncoding { input } => ErrorResponse::new(
                "INVALID_ENCODING",
                "Target URL contains malformed percent-encoding",
            )
            .with_context("path", input.as_str()),
            InvalidTargetUrl { url, reason } => {
                ErrorResponse::new("INVALID_TARGET_URL", format!("Invalid target URL: {reason}"))
                    .with_context("url", url.as_str())
            }
            DisallowedProtocol { protocol, url } => ErrorResponse::new(
                "DISALLOWED_PROTOCOL",
                format!("Protocol '{protocol}' is not allowed; use http or https"),
            )
            .with_context("protocol", protocol.as_str())
            .with_context("url", url.as_str()),
            RequestTooLarge { size, max_size } => ErrorResponse::new(
                "REQUEST_TOO_LARGE",
                format!("Request body exceeds maximum of {max_size} bytes"),
            )
            .with_context("max_size", *max_size.as_ref())
            .with_context("size", *size.as_ref()),
            Timeout(duration) => ErrorResponse::new(
                "TIMEOUT",
                format!("Target did not respond within {duration:?}"),
            )
            .with_context("timeout_ms", duration.as_millis() as u64),
            Unreachable { target, reason } => {
                ErrorResponse::new("UNREACHABLE", format!("Target unreachable: {reason}"))
                    .with_context("target", target.as_str())
            }
            Unexpected(msg) => {
                ErrorResponse::new("UNEXPECTED", format!("Outbound request failed: {msg}"))
            }
            SerializationError(e) => {
                ErrorResponse::new("SERIALIZATION_ERROR", format!("Serialization error: {e}"))
            }
            Internal(_) => ErrorResponse::new("INTERNAL_ERROR", "Internal server error"),
        }
    }

    fn status_code(&self) -> StatusCode {
        use ProxyError::*;

        match self {
            MissingTarget
            | InvalidEncoding { .. }
            | InvalidTargetUrl { .. }
            | DisallowedProtocol { .. } => StatusCode::BAD_REQUEST,
            RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Unreachable { .. } => StatusCode::BAD_GATEWAY,
            Unexpected(_) | SerializationError(_) | Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error conversion for Axum responses using standardized format
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Proxy request failed");
        }
        self.to_error_response().into_response_with_status(status)
    }
}

/// Response for a panic caught at the service boundary
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Request handler panicked");

    ErrorResponse::new("INTERNAL_ERROR", "Internal server error")
        .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR)
}
