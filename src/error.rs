//! Configuration error types for the API client.
//!
//! Request failures are reported through [`ApiError`](crate::clients::ApiError);
//! this module only covers problems found while building a
//! [`ClientConfig`](crate::config::ClientConfig) or its newtypes.
//!
//! # Example
//!
//! ```rust
//! use scm_api::{AuthToken, ConfigError};
//!
//! let result = AuthToken::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyAuthToken)));
//! ```

use thiserror::Error;

/// Errors that can occur during client configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Auth token cannot be empty.
    #[error("Auth token cannot be empty. Use `set_auth_token(None)` to clear the token.")]
    EmptyAuthToken,

    /// Base URL is invalid.
    #[error("Invalid base URL '{url}'. Please provide an http or https URL (e.g., 'https://scm.example.com/api').")]
    InvalidBaseUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// An environment variable holds a value that cannot be parsed.
    #[error("Invalid value '{value}' for environment variable {key}: expected {expected}.")]
    InvalidEnvValue {
        /// The environment variable name.
        key: &'static str,
        /// The raw value found.
        value: String,
        /// Description of the accepted format.
        expected: &'static str,
    },

    /// Timeout must be greater than zero.
    #[error("Request timeout must be greater than zero.")]
    ZeroTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_base_url_error_message() {
        let error = ConfigError::InvalidBaseUrl {
            url: "ftp://nope".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("ftp://nope"));
        assert!(message.contains("http or https"));
    }

    #[test]
    fn test_invalid_env_value_error_message() {
        let error = ConfigError::InvalidEnvValue {
            key: "SCM_API_TIMEOUT_MS",
            value: "soon".to_string(),
            expected: "a non-negative integer",
        };
        let message = error.to_string();
        assert!(message.contains("SCM_API_TIMEOUT_MS"));
        assert!(message.contains("soon"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let error = ConfigError::EmptyAuthToken;
        let _: &dyn std::error::Error = &error;
    }
}
