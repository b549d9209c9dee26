//! The normalized error type surfaced by every API client operation.
//!
//! Whatever goes wrong while talking to the backend (a non-2xx response, a
//! dropped connection, a timeout, a payload that fails validation), callers
//! always receive an [`ApiError`]. The [`ErrorCode`] tells them which kind of
//! failure it was; `status` carries the HTTP status, or `0` when the failure
//! never produced one.
//!
//! # Example
//!
//! ```rust,ignore
//! use scm_api::{ApiClient, ErrorCode, RequestOptions};
//!
//! match client.get("/inventory/summary", RequestOptions::default()).await {
//!     Ok(payload) => println!("Summary: {:?}", payload),
//!     Err(e) if e.code == ErrorCode::HttpError => {
//!         println!("API error {}: {}", e.status, e.message);
//!     }
//!     Err(e) => println!("Request failed: {e}"),
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable category of an [`ApiError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The server answered with a non-2xx status.
    HttpError,
    /// The response failed caller-supplied schema validation.
    ValidationError,
    /// The request could not be completed (network failure, timeout,
    /// undecodable body).
    RequestError,
    /// Anything else, e.g. a queued request abandoned by a closed client.
    Unknown,
}

impl ErrorCode {
    /// Returns the wire representation of this code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HttpError => "HTTP_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RequestError => "REQUEST_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every API client operation.
///
/// `ApiError` is `Clone` so that callers sharing a deduplicated request all
/// receive the same value.
///
/// # Example
///
/// ```rust
/// use scm_api::{ApiError, ErrorCode};
///
/// let error = ApiError::http(404, Some("Not Found"));
/// assert_eq!(error.status, 404);
/// assert_eq!(error.code, ErrorCode::HttpError);
/// assert_eq!(error.to_string(), "HTTP 404: Not Found");
/// ```
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable description of the failure.
    pub message: String,
    /// HTTP status code, or `0` when no response was received.
    pub status: u16,
    /// Failure category.
    pub code: ErrorCode,
    /// Optional structured details (e.g. validation violations).
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Creates an error with the given message, status and code.
    #[must_use]
    pub fn new(message: impl Into<String>, status: u16, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            status,
            code,
            details: None,
        }
    }

    /// Creates an `HTTP_ERROR` for a non-2xx response.
    #[must_use]
    pub fn http(status: u16, reason: Option<&str>) -> Self {
        let message = reason.map_or_else(
            || format!("HTTP {status}"),
            |reason| format!("HTTP {status}: {reason}"),
        );
        Self::new(message, status, ErrorCode::HttpError)
    }

    /// Creates a `VALIDATION_ERROR` carrying the violation details.
    #[must_use]
    pub fn validation(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::new(message, 0, ErrorCode::ValidationError).with_details(details)
    }

    /// Creates a `REQUEST_ERROR` for a failure that produced no HTTP status.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::new(message, 0, ErrorCode::RequestError)
    }

    /// Creates an `UNKNOWN` error.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(message, 0, ErrorCode::Unknown)
    }

    /// Attaches structured details to this error.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns `true` if the server rejected the session (status 401).
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_error_message_includes_reason() {
        let error = ApiError::http(503, Some("Service Unavailable"));
        assert_eq!(error.to_string(), "HTTP 503: Service Unavailable");
        assert_eq!(error.status, 503);

        let error = ApiError::http(599, None);
        assert_eq!(error.to_string(), "HTTP 599");
    }

    #[test]
    fn test_error_code_serializes_in_screaming_case() {
        let json = serde_json::to_string(&ErrorCode::ValidationError).unwrap();
        assert_eq!(json, r#""VALIDATION_ERROR""#);
        assert_eq!(ErrorCode::RequestError.to_string(), "REQUEST_ERROR");
    }

    #[test]
    fn test_validation_error_carries_details() {
        let error = ApiError::validation(
            "Response validation failed",
            json!([{"path": "$.items", "message": "missing field"}]),
        );
        assert_eq!(error.status, 0);
        assert_eq!(error.code, ErrorCode::ValidationError);
        assert_eq!(error.details.unwrap()[0]["path"], "$.items");
    }

    #[test]
    fn test_non_http_errors_have_zero_status() {
        assert_eq!(ApiError::request("connection reset").status, 0);
        assert_eq!(ApiError::unknown("dropped").code, ErrorCode::Unknown);
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ApiError::http(401, Some("Unauthorized")).is_unauthorized());
        assert!(!ApiError::http(403, Some("Forbidden")).is_unauthorized());
    }

    #[test]
    fn test_error_implements_std_error() {
        let error: &dyn std::error::Error = &ApiError::unknown("test");
        let _ = error;
    }
}
