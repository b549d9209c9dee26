//! # SCM API Client
//!
//! The request-lifecycle core of a supply-chain management dashboard: every
//! screen talks to the backend through one [`ApiClient`].
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`ClientConfig`] and [`ClientConfigBuilder`],
//!   optionally seeded from `SCM_API_*` environment variables
//! - Validated newtypes for the base URL and bearer token
//! - GET, POST, PUT, PATCH, DELETE and multipart uploads
//! - Request, response and error interceptor chains
//! - Deduplication of identical in-flight requests
//! - Retry with capped exponential backoff
//! - An offline FIFO queue replayed when connectivity returns
//! - A 401 handler that clears the token and broadcasts [`ClientEvent::Unauthorized`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use scm_api::{BaseUrl, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://scm.example.com/api").unwrap())
//!     .timeout(Duration::from_secs(15))
//!     .retry_attempts(3)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.base_url().to_string(), "https://scm.example.com/api");
//! ```
//!
//! ## Making API Requests
//!
//! ```rust,ignore
//! use scm_api::{ApiClient, AuthToken, ClientConfig, MultipartForm, RequestOptions};
//!
//! let client = ApiClient::new(ClientConfig::from_env()?.build()?);
//! client.set_auth_token(Some(AuthToken::new(token)?));
//!
//! let created = client
//!     .post("/purchase-orders", &new_order, RequestOptions::default())
//!     .await?;
//!
//! let form = MultipartForm::new()
//!     .text("warehouse", "WH-01")
//!     .file("file", "stock.csv", csv_bytes);
//! client.upload_file("/inventory/import", form, RequestOptions::default()).await?;
//! ```
//!
//! ## Connectivity
//!
//! ```rust,ignore
//! use tokio::sync::watch;
//! use scm_api::{ApiClient, ClientConfig, Connectivity};
//!
//! let (tx, rx) = watch::channel(Connectivity::Online);
//! let client = ApiClient::builder()
//!     .config(ClientConfig::default())
//!     .connectivity(rx)
//!     .build();
//!
//! // Requests made while offline wait in the queue...
//! tx.send(Connectivity::Offline)?;
//! // ...and are replayed in order once the signal flips back.
//! tx.send(Connectivity::Online)?;
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: The client is constructed and owned by the application
//! - **Fail-fast validation**: All newtypes validate on construction
//! - **Thread-safe**: All types are `Send + Sync`
//! - **Async-first**: Designed for use with Tokio async runtime
//! - **One error type**: Every failure reaches callers as an [`ApiError`]

pub mod clients;
pub mod config;
pub mod error;

// Re-export public types at crate root for convenience
pub use config::{AuthToken, BaseUrl, ClientConfig, ClientConfigBuilder};
pub use error::ConfigError;

pub use clients::interceptors;
pub use clients::{
    ApiClient, ApiClientBuilder, ApiError, ClientEvent, ClientStats, Connectivity, ErrorCode,
    HttpMethod, MultipartForm, Payload, RequestBody, RequestConfig, RequestOptions,
};
