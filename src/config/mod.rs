//! Configuration types for the API client.
//!
//! # Overview
//!
//! - [`ClientConfig`]: immutable settings held for the lifetime of a client
//! - [`ClientConfigBuilder`]: a builder for constructing [`ClientConfig`] instances
//! - [`BaseUrl`]: a validated base URL newtype
//! - [`AuthToken`]: a bearer token with masked debug output
//!
//! Defaults can be sourced from the process environment with
//! [`ClientConfig::from_env`]; any field can then be overridden on the builder.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use scm_api::{BaseUrl, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://scm.example.com/api").unwrap())
//!     .timeout(Duration::from_secs(10))
//!     .retry_attempts(5)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.retry_attempts(), 5);
//! ```

mod newtypes;

pub use newtypes::{AuthToken, BaseUrl};

use std::time::Duration;

use crate::error::ConfigError;

/// Default base URL when neither the builder nor the environment sets one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default retry attempt cap.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Environment variable names read by [`ClientConfig::from_env`].
pub mod env {
    /// Base URL for all requests.
    pub const BASE_URL: &str = "SCM_API_BASE_URL";
    /// Request timeout in milliseconds.
    pub const TIMEOUT_MS: &str = "SCM_API_TIMEOUT_MS";
    /// Retry attempt cap.
    pub const RETRY_ATTEMPTS: &str = "SCM_API_RETRY_ATTEMPTS";
    /// Base backoff delay in milliseconds.
    pub const RETRY_DELAY_MS: &str = "SCM_API_RETRY_DELAY_MS";
    /// Enables in-flight request deduplication.
    pub const ENABLE_DEDUPLICATION: &str = "SCM_API_ENABLE_DEDUPLICATION";
    /// Enables offline request queueing.
    pub const ENABLE_OFFLINE_QUEUE: &str = "SCM_API_ENABLE_OFFLINE_QUEUE";
    /// Enables request timing logs.
    pub const ENABLE_PERFORMANCE_TRACKING: &str = "SCM_API_ENABLE_PERFORMANCE_TRACKING";
}

/// Configuration for the API client.
///
/// # Thread Safety
///
/// `ClientConfig` is `Clone`, `Send`, and `Sync`, making it safe to share
/// across threads and async tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: BaseUrl,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
    enable_deduplication: bool,
    enable_offline_queue: bool,
    enable_performance_tracking: bool,
}

impl ClientConfig {
    /// Creates a new builder populated with the built-in defaults.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Creates a builder whose defaults come from the process environment.
    ///
    /// Unset variables fall back to the built-in defaults. See [`env`] for
    /// the variable names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to a malformed value.
    pub fn from_env() -> Result<ClientConfigBuilder, ConfigError> {
        ClientConfigBuilder::from_lookup(|key| std::env::var(key).ok())
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the retry attempt cap.
    ///
    /// This is the total number of times the network layer is invoked for a
    /// request that keeps failing with a retryable error. Zero behaves like one.
    #[must_use]
    pub const fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// Returns the base delay used for exponential backoff.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Returns whether identical in-flight requests are deduplicated.
    #[must_use]
    pub const fn enable_deduplication(&self) -> bool {
        self.enable_deduplication
    }

    /// Returns whether requests are queued while offline.
    #[must_use]
    pub const fn enable_offline_queue(&self) -> bool {
        self.enable_offline_queue
    }

    /// Returns whether request timings are logged.
    #[must_use]
    pub const fn enable_performance_tracking(&self) -> bool {
        self.enable_performance_tracking
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            enable_deduplication: true,
            enable_offline_queue: true,
            enable_performance_tracking: false,
        }
    }
}

// Verify ClientConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientConfig>();
};

fn default_base_url() -> BaseUrl {
    match BaseUrl::new(DEFAULT_BASE_URL) {
        Ok(url) => url,
        Err(_) => unreachable!("DEFAULT_BASE_URL is a valid URL"),
    }
}

/// Builder for constructing [`ClientConfig`] instances.
///
/// Every field is optional; unset fields take the defaults listed below
/// (or the environment-derived values when created via
/// [`ClientConfig::from_env`]).
///
/// # Defaults
///
/// - `base_url`: `http://localhost:8080/api`
/// - `timeout`: 30 seconds
/// - `retry_attempts`: 3
/// - `retry_delay`: 1 second
/// - `enable_deduplication`: `true`
/// - `enable_offline_queue`: `true`
/// - `enable_performance_tracking`: `false`
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<BaseUrl>,
    timeout: Option<Duration>,
    retry_attempts: Option<u32>,
    retry_delay: Option<Duration>,
    enable_deduplication: Option<bool>,
    enable_offline_queue: Option<bool>,
    enable_performance_tracking: Option<bool>,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from an arbitrary key lookup.
    ///
    /// [`ClientConfig::from_env`] calls this with `std::env::var`; tests can
    /// pass a map instead of touching the real environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a present value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new();

        if let Some(raw) = lookup(env::BASE_URL) {
            builder.base_url = Some(BaseUrl::new(raw)?);
        }
        if let Some(ms) = parse_u64(&lookup, env::TIMEOUT_MS)? {
            builder.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(raw) = lookup(env::RETRY_ATTEMPTS) {
            let attempts = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    key: env::RETRY_ATTEMPTS,
                    value: raw.clone(),
                    expected: "a non-negative integer",
                })?;
            builder.retry_attempts = Some(attempts);
        }
        if let Some(ms) = parse_u64(&lookup, env::RETRY_DELAY_MS)? {
            builder.retry_delay = Some(Duration::from_millis(ms));
        }
        builder.enable_deduplication = parse_flag(&lookup, env::ENABLE_DEDUPLICATION)?;
        builder.enable_offline_queue = parse_flag(&lookup, env::ENABLE_OFFLINE_QUEUE)?;
        builder.enable_performance_tracking =
            parse_flag(&lookup, env::ENABLE_PERFORMANCE_TRACKING)?;

        Ok(builder)
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: BaseUrl) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry attempt cap.
    #[must_use]
    pub const fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    /// Sets the base backoff delay.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Enables or disables in-flight request deduplication.
    #[must_use]
    pub const fn enable_deduplication(mut self, enabled: bool) -> Self {
        self.enable_deduplication = Some(enabled);
        self
    }

    /// Enables or disables offline request queueing.
    #[must_use]
    pub const fn enable_offline_queue(mut self, enabled: bool) -> Self {
        self.enable_offline_queue = Some(enabled);
        self
    }

    /// Enables or disables request timing logs.
    #[must_use]
    pub const fn enable_performance_tracking(mut self, enabled: bool) -> Self {
        self.enable_performance_tracking = Some(enabled);
        self
    }

    /// Builds the [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTimeout`] if the timeout is zero.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let defaults = ClientConfig::default();
        let timeout = self.timeout.unwrap_or(defaults.timeout);
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(ClientConfig {
            base_url: self.base_url.unwrap_or(defaults.base_url),
            timeout,
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            enable_deduplication: self
                .enable_deduplication
                .unwrap_or(defaults.enable_deduplication),
            enable_offline_queue: self
                .enable_offline_queue
                .unwrap_or(defaults.enable_offline_queue),
            enable_performance_tracking: self
                .enable_performance_tracking
                .unwrap_or(defaults.enable_performance_tracking),
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    key,
                    value: raw.clone(),
                    expected: "a non-negative integer",
                })
        })
        .transpose()
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidEnvValue {
                key,
                value: raw.clone(),
                expected: "a boolean (true/false)",
            }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_builder_provides_sensible_defaults() {
        let config = ClientConfig::builder().build().unwrap();

        assert_eq!(config.base_url().as_ref(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
        assert_eq!(config.retry_attempts(), 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(1_000));
        assert!(config.enable_deduplication());
        assert!(config.enable_offline_queue());
        assert!(!config.enable_performance_tracking());
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = ClientConfig::builder().timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let lookup = lookup_from(&[
            (env::BASE_URL, "https://scm.example.com/api"),
            (env::TIMEOUT_MS, "5000"),
            (env::RETRY_ATTEMPTS, "5"),
            (env::RETRY_DELAY_MS, "250"),
            (env::ENABLE_DEDUPLICATION, "false"),
            (env::ENABLE_OFFLINE_QUEUE, "0"),
            (env::ENABLE_PERFORMANCE_TRACKING, "yes"),
        ]);

        let config = ClientConfigBuilder::from_lookup(lookup)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.base_url().host_name(), "scm.example.com");
        assert_eq!(config.timeout(), Duration::from_millis(5_000));
        assert_eq!(config.retry_attempts(), 5);
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert!(!config.enable_deduplication());
        assert!(!config.enable_offline_queue());
        assert!(config.enable_performance_tracking());
    }

    #[test]
    fn test_builder_overrides_environment_values() {
        let lookup = lookup_from(&[(env::RETRY_ATTEMPTS, "7")]);

        let config = ClientConfigBuilder::from_lookup(lookup)
            .unwrap()
            .retry_attempts(1)
            .build()
            .unwrap();

        assert_eq!(config.retry_attempts(), 1);
        // Untouched fields keep their defaults
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let result = ClientConfigBuilder::from_lookup(lookup_from(&[(env::TIMEOUT_MS, "soon")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvValue {
                key: env::TIMEOUT_MS,
                ..
            })
        ));

        let result =
            ClientConfigBuilder::from_lookup(lookup_from(&[(env::ENABLE_OFFLINE_QUEUE, "maybe")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvValue {
                key: env::ENABLE_OFFLINE_QUEUE,
                ..
            })
        ));

        let result = ClientConfigBuilder::from_lookup(lookup_from(&[(env::BASE_URL, "nope")]));
        assert!(matches!(result, Err(ConfigError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn test_config_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientConfig>();
    }
}
