//! Interceptor chains for requests, responses and errors.
//!
//! Each chain is an ordered, append-only list. Interceptors run strictly in
//! registration order; each one receives the output of the previous one.
//!
//! - [`RequestInterceptor`]: transforms the outgoing [`RequestConfig`]
//! - [`ResponseInterceptor`]: transforms a parsed [`Payload`]
//! - [`ErrorInterceptor`]: transforms or observes a final [`ApiError`]
//!
//! Closures are adapted with [`request_fn`], [`response_fn`] and [`error_fn`].
//!
//! # Example
//!
//! ```rust,ignore
//! use scm_api::interceptors::request_fn;
//!
//! client.add_request_interceptor(request_fn(|mut config| async move {
//!     config.set_header("X-Tenant", "acme");
//!     Ok(config)
//! }));
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::clients::errors::ApiError;
use crate::clients::http_request::RequestConfig;
use crate::clients::http_response::Payload;
use crate::clients::ClientEvent;
use crate::config::AuthToken;

/// Transforms an outgoing request before it is sent.
pub trait RequestInterceptor: Send + Sync {
    /// Returns the config for the next interceptor, or an error that fails
    /// the request.
    fn intercept(&self, config: RequestConfig) -> BoxFuture<'_, Result<RequestConfig, ApiError>>;
}

/// Transforms a parsed response payload.
pub trait ResponseInterceptor: Send + Sync {
    /// Returns the payload for the next interceptor, or an error that fails
    /// the request.
    fn intercept(&self, payload: Payload) -> BoxFuture<'_, Result<Payload, ApiError>>;
}

/// Transforms or observes a request failure before it reaches the caller.
pub trait ErrorInterceptor: Send + Sync {
    /// Returns the error for the next interceptor.
    fn intercept(&self, error: ApiError) -> BoxFuture<'_, ApiError>;
}

/// A [`RequestInterceptor`] backed by a closure. See [`request_fn`].
#[derive(Clone, Copy)]
pub struct RequestFn<F>(F);

/// A [`ResponseInterceptor`] backed by a closure. See [`response_fn`].
#[derive(Clone, Copy)]
pub struct ResponseFn<F>(F);

/// An [`ErrorInterceptor`] backed by a closure. See [`error_fn`].
#[derive(Clone, Copy)]
pub struct ErrorFn<F>(F);

/// Wraps an async closure as a [`RequestInterceptor`].
pub const fn request_fn<F, Fut>(f: F) -> RequestFn<F>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RequestConfig, ApiError>> + Send + 'static,
{
    RequestFn(f)
}

/// Wraps an async closure as a [`ResponseInterceptor`].
pub const fn response_fn<F, Fut>(f: F) -> ResponseFn<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, ApiError>> + Send + 'static,
{
    ResponseFn(f)
}

/// Wraps an async closure as an [`ErrorInterceptor`].
pub const fn error_fn<F, Fut>(f: F) -> ErrorFn<F>
where
    F: Fn(ApiError) -> Fut + Send + Sync,
    Fut: Future<Output = ApiError> + Send + 'static,
{
    ErrorFn(f)
}

impl<F, Fut> RequestInterceptor for RequestFn<F>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RequestConfig, ApiError>> + Send + 'static,
{
    fn intercept(&self, config: RequestConfig) -> BoxFuture<'_, Result<RequestConfig, ApiError>> {
        (self.0)(config).boxed()
    }
}

impl<F, Fut> ResponseInterceptor for ResponseFn<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, ApiError>> + Send + 'static,
{
    fn intercept(&self, payload: Payload) -> BoxFuture<'_, Result<Payload, ApiError>> {
        (self.0)(payload).boxed()
    }
}

impl<F, Fut> ErrorInterceptor for ErrorFn<F>
where
    F: Fn(ApiError) -> Fut + Send + Sync,
    Fut: Future<Output = ApiError> + Send + 'static,
{
    fn intercept(&self, error: ApiError) -> BoxFuture<'_, ApiError> {
        (self.0)(error).boxed()
    }
}

/// Shared slot holding the current bearer token.
pub(crate) type TokenSlot = Arc<RwLock<Option<AuthToken>>>;

/// Adds `Authorization: Bearer <token>` when a token is set.
pub(crate) struct BearerAuth {
    token: TokenSlot,
}

impl BearerAuth {
    pub(crate) const fn new(token: TokenSlot) -> Self {
        Self { token }
    }
}

impl RequestInterceptor for BearerAuth {
    fn intercept(&self, mut config: RequestConfig) -> BoxFuture<'_, Result<RequestConfig, ApiError>> {
        let bearer = self.token.read().as_ref().map(AuthToken::bearer);
        if let Some(bearer) = bearer {
            config.set_header("Authorization", bearer);
        }
        future::ready(Ok(config)).boxed()
    }
}

/// Clears the token and broadcasts [`ClientEvent::Unauthorized`] on a 401.
pub(crate) struct UnauthorizedHandler {
    token: TokenSlot,
    events: broadcast::Sender<ClientEvent>,
}

impl UnauthorizedHandler {
    pub(crate) const fn new(token: TokenSlot, events: broadcast::Sender<ClientEvent>) -> Self {
        Self { token, events }
    }
}

impl ErrorInterceptor for UnauthorizedHandler {
    fn intercept(&self, error: ApiError) -> BoxFuture<'_, ApiError> {
        if error.is_unauthorized() {
            self.token.write().take();
            tracing::warn!("Session rejected with 401, auth token cleared");
            // No subscribers is fine
            let _ = self.events.send(ClientEvent::Unauthorized);
        }
        future::ready(error).boxed()
    }
}

/// The three interceptor chains of a client.
#[derive(Default)]
pub(crate) struct InterceptorChains {
    request: RwLock<Vec<Arc<dyn RequestInterceptor>>>,
    response: RwLock<Vec<Arc<dyn ResponseInterceptor>>>,
    error: RwLock<Vec<Arc<dyn ErrorInterceptor>>>,
}

impl InterceptorChains {
    pub(crate) fn push_request(&self, interceptor: Arc<dyn RequestInterceptor>) {
        self.request.write().push(interceptor);
    }

    pub(crate) fn push_response(&self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.response.write().push(interceptor);
    }

    pub(crate) fn push_error(&self, interceptor: Arc<dyn ErrorInterceptor>) {
        self.error.write().push(interceptor);
    }

    pub(crate) async fn apply_request(
        &self,
        mut config: RequestConfig,
    ) -> Result<RequestConfig, ApiError> {
        let chain = self.request.read().clone();
        for interceptor in chain {
            config = interceptor.intercept(config).await?;
        }
        Ok(config)
    }

    pub(crate) async fn apply_response(&self, mut payload: Payload) -> Result<Payload, ApiError> {
        let chain = self.response.read().clone();
        for interceptor in chain {
            payload = interceptor.intercept(payload).await?;
        }
        Ok(payload)
    }

    pub(crate) async fn apply_error(&self, mut error: ApiError) -> ApiError {
        let chain = self.error.read().clone();
        for interceptor in chain {
            error = interceptor.intercept(error).await;
        }
        error
    }
}

impl fmt::Debug for InterceptorChains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChains")
            .field("request", &self.request.read().len())
            .field("response", &self.response.read().len())
            .field("error", &self.error.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http_request::HttpMethod;
    use std::collections::HashMap;
    use std::time::Duration;

    fn empty_config() -> RequestConfig {
        RequestConfig {
            method: HttpMethod::Get,
            url: "http://localhost/api/orders".to_string(),
            headers: HashMap::new(),
            body: None,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_request_chain_runs_in_registration_order() {
        let chains = InterceptorChains::default();
        chains.push_request(Arc::new(request_fn(|mut config: RequestConfig| async move {
            config.set_header("X", "1");
            Ok::<_, ApiError>(config)
        })));
        chains.push_request(Arc::new(request_fn(|mut config: RequestConfig| async move {
            let seen = config.header("X").unwrap_or("missing").to_string();
            config.set_header("Y", format!("after-{seen}"));
            Ok::<_, ApiError>(config)
        })));

        let config = chains.apply_request(empty_config()).await.unwrap();
        assert_eq!(config.header("X"), Some("1"));
        assert_eq!(config.header("Y"), Some("after-1"));
    }

    #[tokio::test]
    async fn test_failing_request_interceptor_stops_the_chain() {
        let chains = InterceptorChains::default();
        chains.push_request(Arc::new(request_fn(|_config: RequestConfig| async move {
            Err::<RequestConfig, _>(ApiError::request("blocked"))
        })));
        chains.push_request(Arc::new(request_fn(|mut config: RequestConfig| async move {
            config.set_header("Unreached", "yes");
            Ok::<_, ApiError>(config)
        })));

        let error = chains.apply_request(empty_config()).await.unwrap_err();
        assert_eq!(error.message, "blocked");
    }

    #[tokio::test]
    async fn test_response_chain_transforms_payload() {
        let chains = InterceptorChains::default();
        chains.push_response(Arc::new(response_fn(|payload: Payload| async move {
            Ok::<_, ApiError>(match payload {
                Payload::Json(value) => Payload::Json(value["data"].clone()),
                other => other,
            })
        })));

        let payload = chains
            .apply_response(Payload::Json(serde_json::json!({"data": [1, 2]})))
            .await
            .unwrap();
        assert_eq!(payload, Payload::Json(serde_json::json!([1, 2])));
    }

    #[tokio::test]
    async fn test_bearer_auth_reads_current_token() {
        let token: TokenSlot = Arc::new(RwLock::new(None));
        let auth = BearerAuth::new(Arc::clone(&token));

        let config = auth.intercept(empty_config()).await.unwrap();
        assert!(config.header("Authorization").is_none());

        *token.write() = Some(AuthToken::new("abc").unwrap());
        let config = auth.intercept(empty_config()).await.unwrap();
        assert_eq!(config.header("authorization"), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_unauthorized_handler_clears_token_and_broadcasts() {
        let token: TokenSlot = Arc::new(RwLock::new(Some(AuthToken::new("abc").unwrap())));
        let (tx, mut rx) = broadcast::channel(4);
        let handler = UnauthorizedHandler::new(Arc::clone(&token), tx);

        let error = handler.intercept(ApiError::http(403, Some("Forbidden"))).await;
        assert_eq!(error.status, 403);
        assert!(token.read().is_some());
        assert!(rx.try_recv().is_err());

        let error = handler
            .intercept(ApiError::http(401, Some("Unauthorized")))
            .await;
        assert_eq!(error.status, 401);
        assert!(token.read().is_none());
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::Unauthorized);
        assert!(rx.try_recv().is_err());
    }
}
