//! Retry policy: which failures are retried and how long to wait.

use std::time::Duration;

use crate::clients::errors::ApiError;

/// Upper bound on the delay between two attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Returns the delay before retry number `retry` (1-based).
///
/// The delay is `base * 2^(retry - 1)`, capped at [`MAX_RETRY_DELAY`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use scm_api::clients::backoff_delay;
///
/// let base = Duration::from_millis(1000);
/// assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
/// assert_eq!(backoff_delay(base, 3), Duration::from_millis(4000));
/// assert_eq!(backoff_delay(base, 10), Duration::from_secs(30));
/// ```
#[must_use]
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(31);
    base.checked_mul(1_u32 << exponent)
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

/// Returns `true` for statuses worth retrying: 408, 429 and any 5xx.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (status >= 500 && status <= 599)
}

/// Why a single attempt failed, before normalization into [`ApiError`].
#[derive(Debug)]
pub(crate) enum Failure {
    /// An HTTP error status, or an error raised by an interceptor.
    Api(ApiError),
    /// The request never produced a response (connect failure, timeout, reset).
    Transport(reqwest::Error),
    /// A JSON response body could not be decoded.
    Decode(serde_json::Error),
}

/// Transport failures worth another attempt.
///
/// Request construction problems (`is_builder`), redirect loops and decode
/// errors fail the same way every time. `is_request` covers failures while
/// sending, such as a connection reset or a connection closed mid-message.
fn is_transient_transport(error: &reqwest::Error) -> bool {
    if error.is_builder() || error.is_redirect() || error.is_decode() {
        return false;
    }
    error.is_timeout() || error.is_connect() || error.is_body() || error.is_request()
}

impl Failure {
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Self::Api(error) => is_retryable_status(error.status),
            Self::Transport(error) => is_transient_transport(error),
            Self::Decode(_) => false,
        }
    }

    pub(crate) fn into_api_error(self) -> ApiError {
        match self {
            Self::Api(error) => error,
            Self::Transport(error) => {
                let kind = if error.is_timeout() {
                    "timeout"
                } else if error.is_connect() {
                    "connect"
                } else if error.is_builder() {
                    "builder"
                } else {
                    "network"
                };
                ApiError::request(error.to_string())
                    .with_details(serde_json::json!({ "kind": kind }))
            }
            Self::Decode(error) => {
                ApiError::request(format!("Failed to decode response body: {error}"))
                    .with_details(serde_json::json!({ "kind": "decode" }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::ErrorCode;

    #[test]
    fn test_backoff_grows_exponentially() {
        let base = Duration::from_millis(1000);
        let delays: Vec<u128> = (1..=5)
            .map(|n| backoff_delay(base, n).as_millis())
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn test_backoff_is_capped() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 6), MAX_RETRY_DELAY);
        assert_eq!(backoff_delay(base, 40), MAX_RETRY_DELAY);
        assert_eq!(backoff_delay(Duration::from_secs(u64::MAX / 2), 3), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_backoff_treats_zero_as_first_retry() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff_delay(base, 0), base);
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 429, 500, 502, 503, 504, 599] {
            assert!(is_retryable_status(status), "{status} should be retried");
        }
        for status in [200, 400, 401, 403, 404, 409, 422] {
            assert!(!is_retryable_status(status), "{status} should not be retried");
        }
    }

    #[test]
    fn test_api_failures_keep_their_error() {
        let failure = Failure::Api(ApiError::http(503, Some("Service Unavailable")));
        assert!(failure.is_retryable());

        let error = failure.into_api_error();
        assert_eq!(error.status, 503);
        assert_eq!(error.code, ErrorCode::HttpError);
    }

    #[test]
    fn test_request_construction_failures_are_not_retried() {
        let source = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert!(source.is_builder());

        let failure = Failure::Transport(source);
        assert!(!failure.is_retryable());

        let error = failure.into_api_error();
        assert_eq!(error.code, ErrorCode::RequestError);
        assert_eq!(error.details.unwrap()["kind"], "builder");
    }

    #[test]
    fn test_decode_failures_are_not_retried() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let failure = Failure::Decode(source);
        assert!(!failure.is_retryable());

        let error = failure.into_api_error();
        assert_eq!(error.status, 0);
        assert_eq!(error.code, ErrorCode::RequestError);
    }
}
