//! HTTP client types for the supply-chain dashboard API.
//!
//! This module provides the request lifecycle layer used by every feature
//! screen: authenticated requests, retry with backoff, deduplication of
//! identical in-flight calls, offline queueing and interceptor chains.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`ApiClient`]: The async client owning the whole request lifecycle
//! - [`ApiClientBuilder`]: Construction with a connectivity signal or custom transport
//! - [`RequestOptions`]: Per-call headers, query parameters and timeout
//! - [`RequestConfig`]: The request as seen by request interceptors
//! - [`Payload`]: A parsed response body (JSON or text)
//! - [`ApiError`] / [`ErrorCode`]: The single failure type callers observe
//! - [`MultipartForm`]: Bodies for [`ApiClient::upload_file`]
//! - [`ResponseSchema`]: Opt-in response validation
//!
//! # Example
//!
//! ```rust,ignore
//! use scm_api::{ApiClient, ClientConfig, RequestOptions};
//!
//! let client = ApiClient::new(ClientConfig::default());
//! let orders = client
//!     .get("/purchase-orders", RequestOptions::new().query_param("status", "open"))
//!     .await?;
//! ```
//!
//! # Retry Behavior
//!
//! - **408, 429 and 5xx**: Retried up to `retry_attempts` total attempts
//! - **Timeouts and network failures**: Retried the same way
//! - **Other 4xx and decode failures**: Returned immediately
//!
//! The delay before retry `n` is `retry_delay * 2^(n-1)`, capped at
//! [`MAX_RETRY_DELAY`].
//!
//! Retries resend the same body for every method, POST included. Endpoints
//! that are not idempotent should be called with `retry_attempts` set to 1 or
//! guarded server-side.

mod api_client;
mod errors;
mod http_request;
mod http_response;
pub mod interceptors;
mod offline;
mod pending;
mod retry;
mod validation;

pub use api_client::{ApiClient, ApiClientBuilder, ClientEvent, ClientStats, CLIENT_VERSION};
pub use errors::{ApiError, ErrorCode};
pub use http_request::{
    FormPart, HttpMethod, MultipartForm, RequestBody, RequestConfig, RequestOptions,
};
pub use http_response::{is_json_content_type, Payload};
pub use offline::Connectivity;
pub use retry::{backoff_delay, is_retryable_status, MAX_RETRY_DELAY};
pub use validation::{schema_fn, FnSchema, ResponseSchema, SchemaViolation, SerdeSchema};
