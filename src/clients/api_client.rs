//! The request-lifecycle client.
//!
//! [`ApiClient`] provides `get`, `post`, `put`, `patch`, `delete` and
//! `upload_file`, and hides retry, deduplication, offline queueing and
//! interceptor handling from callers. Every failure reaches the caller as an
//! [`ApiError`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use crate::clients::errors::ApiError;
use crate::clients::http_request::{
    HttpMethod, MultipartForm, RequestBody, RequestConfig, RequestOptions, Submission,
};
use crate::clients::http_response::Payload;
use crate::clients::interceptors::{
    BearerAuth, ErrorInterceptor, InterceptorChains, RequestInterceptor, ResponseInterceptor,
    TokenSlot, UnauthorizedHandler,
};
use crate::clients::offline::{Connectivity, OfflineQueue, QueuedRequest};
use crate::clients::pending::{PendingRequests, Registration};
use crate::clients::retry::{backoff_delay, Failure};
use crate::clients::validation::{ResponseSchema, SchemaViolation, SerdeSchema};
use crate::config::{AuthToken, ClientConfig};

/// Client version from Cargo.toml.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capacity of the client event channel.
const EVENT_CAPACITY: usize = 16;

/// Notifications broadcast to the rest of the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// The server answered 401; the auth token has been cleared.
    Unauthorized,
    /// The client switched between online and offline.
    ConnectivityChanged(Connectivity),
}

/// Snapshot of the client's bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientStats {
    /// Deduplicated requests currently in flight.
    pub pending_requests: usize,
    /// Requests parked while offline.
    pub queued_requests: usize,
    /// Current connectivity flag.
    pub is_online: bool,
}

/// HTTP client for the supply-chain dashboard API.
///
/// # Thread Safety
///
/// `ApiClient` is `Send + Sync`. Wrap it in an `Arc` to share it between
/// tasks; it is owned by the application's composition root rather than
/// stored in a global.
///
/// # Example
///
/// ```rust,ignore
/// use scm_api::{ApiClient, AuthToken, ClientConfig, RequestOptions};
///
/// let client = ApiClient::new(ClientConfig::from_env()?.build()?);
/// client.set_auth_token(Some(AuthToken::new("eyJ...")?));
///
/// let summary = client
///     .get("/inventory/summary", RequestOptions::default())
///     .await?;
/// ```
#[derive(Debug)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

// Verify ApiClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ApiClient>();
};

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    config: RwLock<Arc<ClientConfig>>,
    default_headers: HashMap<String, String>,
    token: TokenSlot,
    interceptors: InterceptorChains,
    pending: PendingRequests,
    offline: OfflineQueue,
    replay_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
}

/// A submission resolved against the current configuration.
#[derive(Clone, Debug)]
struct Prepared {
    method: HttpMethod,
    path: String,
    url: String,
    body: Option<RequestBody>,
    options: RequestOptions,
    signature: String,
}

/// Builder for [`ApiClient`].
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    connectivity: Option<watch::Receiver<Connectivity>>,
    http_client: Option<reqwest::Client>,
}

impl ApiClientBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Follows a connectivity signal for the lifetime of the client.
    ///
    /// The current value of the channel sets the initial online flag.
    #[must_use]
    pub fn connectivity(mut self, receiver: watch::Receiver<Connectivity>) -> Self {
        self.connectivity = Some(receiver);
        self
    }

    /// Uses a preconfigured reqwest client (proxies, TLS roots).
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the client.
    ///
    /// # Panics
    ///
    /// Panics if no reqwest client was supplied and one cannot be created
    /// (e.g., TLS initialization failure), or if a connectivity signal was
    /// supplied outside a Tokio runtime.
    #[must_use]
    pub fn build(self) -> ApiClient {
        let config = self.config.unwrap_or_default();
        let initial = self
            .connectivity
            .as_ref()
            .map_or(Connectivity::Online, |rx| *rx.borrow());

        let http = self.http_client.unwrap_or_else(|| {
            reqwest::Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to create HTTP client")
        });

        let mut default_headers = HashMap::new();
        default_headers.insert(
            "User-Agent".to_string(),
            format!("scm-api-client v{CLIENT_VERSION}"),
        );
        default_headers.insert("Accept".to_string(), "application/json".to_string());

        let token: TokenSlot = Arc::new(RwLock::new(None));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let interceptors = InterceptorChains::default();
        interceptors.push_request(Arc::new(BearerAuth::new(Arc::clone(&token))));
        interceptors.push_error(Arc::new(UnauthorizedHandler::new(
            Arc::clone(&token),
            events.clone(),
        )));

        let inner = Arc::new(ClientInner {
            http,
            config: RwLock::new(Arc::new(config)),
            default_headers,
            token,
            interceptors,
            pending: PendingRequests::default(),
            offline: OfflineQueue::new(initial),
            replay_lock: tokio::sync::Mutex::new(()),
            events,
        });

        let listener = self
            .connectivity
            .map(|rx| spawn_connectivity_listener(&inner, rx));

        ApiClient {
            inner,
            listener: Mutex::new(listener),
        }
    }
}

/// Follows `rx` until the channel closes or the client is dropped.
fn spawn_connectivity_listener(
    inner: &Arc<ClientInner>,
    mut rx: watch::Receiver<Connectivity>,
) -> JoinHandle<()> {
    let weak: Weak<ClientInner> = Arc::downgrade(inner);
    tokio::spawn(async move {
        loop {
            let connectivity = *rx.borrow_and_update();
            let Some(inner) = weak.upgrade() else { break };
            // Replay must not block this loop: an Offline arriving mid-replay
            // has to reach the flag before the next queued request is sent.
            let batch = inner.transition(connectivity);
            if batch.is_empty() {
                drop(inner);
            } else {
                tokio::spawn(async move { inner.replay(batch).await });
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}

impl ApiClient {
    /// Creates a client with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the underlying reqwest client cannot be created. This should
    /// only happen in extremely unusual circumstances (e.g., TLS initialization failure).
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        ApiClientBuilder::new().config(config).build()
    }

    /// Returns a builder for advanced construction.
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<ClientConfig> {
        self.inner.current_config()
    }

    /// Replaces the configuration. Requests already in flight keep the
    /// configuration they started with.
    pub fn reconfigure(&self, config: ClientConfig) {
        *self.inner.config.write() = Arc::new(config);
        tracing::debug!("API client reconfigured");
    }

    /// Returns the headers sent with every request.
    #[must_use]
    pub fn default_headers(&self) -> &HashMap<String, String> {
        &self.inner.default_headers
    }

    /// Sets or clears the bearer token. The token is held in memory only.
    pub fn set_auth_token(&self, token: Option<AuthToken>) {
        *self.inner.token.write() = token;
    }

    /// Returns `true` if a bearer token is currently set.
    #[must_use]
    pub fn has_auth_token(&self) -> bool {
        self.inner.token.read().is_some()
    }

    /// Appends a request interceptor.
    pub fn add_request_interceptor(&self, interceptor: impl RequestInterceptor + 'static) {
        self.inner.interceptors.push_request(Arc::new(interceptor));
    }

    /// Appends a response interceptor.
    pub fn add_response_interceptor(&self, interceptor: impl ResponseInterceptor + 'static) {
        self.inner.interceptors.push_response(Arc::new(interceptor));
    }

    /// Appends an error interceptor.
    pub fn add_error_interceptor(&self, interceptor: impl ErrorInterceptor + 'static) {
        self.inner.interceptors.push_error(Arc::new(interceptor));
    }

    /// Subscribes to [`ClientEvent`]s such as [`ClientEvent::Unauthorized`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the current pending, queued and connectivity state.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            pending_requests: self.inner.pending.len(),
            queued_requests: self.inner.offline.len(),
            is_online: self.inner.offline.is_online(),
        }
    }

    /// Applies a connectivity transition.
    ///
    /// Going online replays every queued request in FIFO order; this future
    /// completes when the replay is done.
    pub async fn set_connectivity(&self, connectivity: Connectivity) {
        let batch = self.inner.transition(connectivity);
        self.inner.replay(batch).await;
    }

    /// Stops following the connectivity signal and rejects queued requests.
    pub fn close(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        let abandoned = self.inner.offline.drain();
        if !abandoned.is_empty() {
            tracing::warn!(
                count = abandoned.len(),
                "API client closed with queued requests"
            );
        }
        for queued in abandoned {
            let _ = queued.responder.send(Err(ApiError::unknown(
                "API client was closed before the queued request was sent",
            )));
        }
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request ultimately fails.
    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Payload, ApiError> {
        self.request(HttpMethod::Get, path, None, options).await
    }

    /// Sends a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the body cannot be serialized or the request
    /// ultimately fails.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        let body = RequestBody::json(body)?;
        self.request(HttpMethod::Post, path, Some(body), options)
            .await
    }

    /// Sends a PUT request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the body cannot be serialized or the request
    /// ultimately fails.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        let body = RequestBody::json(body)?;
        self.request(HttpMethod::Put, path, Some(body), options).await
    }

    /// Sends a PATCH request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the body cannot be serialized or the request
    /// ultimately fails.
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        let body = RequestBody::json(body)?;
        self.request(HttpMethod::Patch, path, Some(body), options)
            .await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request ultimately fails.
    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Payload, ApiError> {
        self.request(HttpMethod::Delete, path, None, options).await
    }

    /// Uploads a multipart form with POST.
    ///
    /// Any caller-supplied `Content-Type` header is dropped so the multipart
    /// boundary is set by the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request ultimately fails.
    pub async fn upload_file(
        &self,
        path: &str,
        form: MultipartForm,
        mut options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        options.strip_content_type();
        self.request(
            HttpMethod::Post,
            path,
            Some(RequestBody::Multipart(form)),
            options,
        )
        .await
    }

    /// Sends a GET request and decodes the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails, or a `VALIDATION_ERROR` if
    /// the payload does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let payload = self.get(path, options).await?;
        self.validate_response(&payload, &SerdeSchema::<T>::new())
    }

    /// Sends a POST request and decodes the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails, or a `VALIDATION_ERROR` if
    /// the payload does not match `T`.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let payload = self.post(path, body, options).await?;
        self.validate_response(&payload, &SerdeSchema::<T>::new())
    }

    /// Checks a payload against a schema.
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION_ERROR` whose details list the violations.
    pub fn validate_response<S: ResponseSchema>(
        &self,
        payload: &Payload,
        schema: &S,
    ) -> Result<S::Output, ApiError> {
        let value = payload.clone().into_value();
        schema.validate(&value).map_err(|violations| {
            tracing::warn!(
                violations = violations.len(),
                "API response failed validation"
            );
            let details = violations_to_json(&violations);
            ApiError::validation("API response failed validation", details)
        })
    }

    /// Sends a request with an explicit method and optional body.
    ///
    /// This is the entry point behind every verb helper.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request ultimately fails.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        let submission = Submission {
            method,
            path: path.to_string(),
            body,
            options,
        };
        self.inner.submit(submission).await
    }
}

impl Drop for ApiClient {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

fn violations_to_json(violations: &[SchemaViolation]) -> serde_json::Value {
    serde_json::to_value(violations).unwrap_or(serde_json::Value::Null)
}

impl ClientInner {
    fn current_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config.read())
    }

    /// Queues the submission when offline, otherwise dispatches it.
    async fn submit(self: &Arc<Self>, submission: Submission) -> Result<Payload, ApiError> {
        if self.current_config().enable_offline_queue() {
            let (tx, rx) = oneshot::channel();
            let queued = self
                .offline
                .try_enqueue(|| QueuedRequest::new(submission.clone(), tx));
            if queued {
                tracing::debug!(
                    method = %submission.method,
                    path = %submission.path,
                    "Client offline, request queued"
                );
                return rx.await.unwrap_or_else(|_| {
                    Err(ApiError::unknown(
                        "Queued request was dropped before it could be sent",
                    ))
                });
            }
        }
        self.dispatch(submission).await
    }

    /// Resolves the URL and either joins an identical in-flight request or
    /// executes a new one.
    async fn dispatch(self: &Arc<Self>, submission: Submission) -> Result<Payload, ApiError> {
        let config = self.current_config();
        let prepared = match prepare(&config, submission) {
            Ok(prepared) => prepared,
            Err(error) => return Err(self.interceptors.apply_error(error).await),
        };

        if !config.enable_deduplication() {
            return self.execute(&prepared, &config).await;
        }

        let signature = prepared.signature.clone();
        let (outcome, registration) = self.pending.join_or_start(&signature, || {
            let inner = Arc::clone(self);
            async move {
                let result = inner.execute(&prepared, &config).await;
                inner.pending.remove(&prepared.signature);
                result
            }
            .boxed()
        });

        match registration {
            Registration::Joined => {
                tracing::debug!(signature = %signature, "Joining in-flight request");
            }
            // Driven on its own task so the entry settles even if every
            // caller goes away.
            Registration::Leader => {
                tokio::spawn(outcome.clone());
            }
        }
        outcome.await
    }

    /// Runs the attempt loop with capped exponential backoff.
    async fn execute(
        &self,
        prepared: &Prepared,
        config: &ClientConfig,
    ) -> Result<Payload, ApiError> {
        let max_attempts = config.retry_attempts().max(1);
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let failure = match self.attempt(prepared, config).await {
                Ok(payload) => return Ok(payload),
                Err(failure) => failure,
            };

            let retryable = failure.is_retryable();
            if retryable && attempt < max_attempts {
                let delay = backoff_delay(config.retry_delay(), attempt);
                tracing::warn!(
                    method = %prepared.method,
                    url = %prepared.url,
                    attempt,
                    delay_ms = duration_ms(delay),
                    "Retrying API request after transient failure"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let error = self.interceptors.apply_error(failure.into_api_error()).await;
            tracing::error!(
                method = %prepared.method,
                url = %prepared.url,
                attempt,
                duration_ms = duration_ms(started.elapsed()),
                retryable,
                status = error.status,
                code = %error.code,
                "API request failed: {}",
                error.message
            );
            return Err(error);
        }
    }

    /// One network round trip, interceptors included.
    async fn attempt(&self, prepared: &Prepared, config: &ClientConfig) -> Result<Payload, Failure> {
        let request = self.build_request_config(prepared, config);
        let request = self
            .interceptors
            .apply_request(request)
            .await
            .map_err(Failure::Api)?;

        let started = Instant::now();
        let sent = self.send(&request).await;
        if config.enable_performance_tracking() {
            let status = sent
                .as_ref()
                .map_or_else(|_| "error".to_string(), |res| res.status().as_u16().to_string());
            tracing::debug!(
                method = %prepared.method,
                path = %prepared.path,
                duration_ms = duration_ms(started.elapsed()),
                status = %status,
                "API request completed"
            );
        }
        let response = sent.map_err(Failure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Failure::Api(ApiError::http(
                status.as_u16(),
                status.canonical_reason(),
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let text = response.text().await.map_err(Failure::Transport)?;
        let payload = Payload::parse(content_type.as_deref(), &text).map_err(Failure::Decode)?;

        self.interceptors
            .apply_response(payload)
            .await
            .map_err(Failure::Api)
    }

    fn build_request_config(&self, prepared: &Prepared, config: &ClientConfig) -> RequestConfig {
        let body = if prepared.method.has_body() {
            prepared.body.clone()
        } else {
            None
        };

        let mut request = RequestConfig {
            method: prepared.method,
            url: prepared.url.clone(),
            headers: self.default_headers.clone(),
            body,
            timeout: prepared.options.timeout.unwrap_or_else(|| config.timeout()),
        };

        let multipart = request.body.as_ref().is_some_and(RequestBody::is_multipart);
        if !multipart {
            request.set_header("Content-Type", "application/json");
        }
        for (name, value) in &prepared.options.headers {
            if multipart && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            request.set_header(name.clone(), value.clone());
        }
        request
    }

    async fn send(&self, request: &RequestConfig) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .http
            .request(request.method.into(), &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        match &request.body {
            Some(RequestBody::Json(text)) => builder = builder.body(text.clone()),
            Some(RequestBody::Multipart(form)) => builder = builder.multipart(form.to_form()?),
            None => {}
        }

        builder.send().await
    }

    /// Updates the online flag and returns the requests to replay, if any.
    fn transition(&self, connectivity: Connectivity) -> VecDeque<QueuedRequest> {
        let (changed, batch) = match connectivity {
            Connectivity::Offline => (self.offline.go_offline(), VecDeque::new()),
            Connectivity::Online => self.offline.go_online(),
        };
        if changed {
            tracing::info!(connectivity = ?connectivity, "API client connectivity changed");
            let _ = self.events.send(ClientEvent::ConnectivityChanged(connectivity));
        }
        batch
    }

    /// Replays queued requests one at a time, in the order they were queued.
    async fn replay(self: &Arc<Self>, mut batch: VecDeque<QueuedRequest>) {
        if batch.is_empty() {
            return;
        }
        // Replays run one after another so batches keep their queue order
        let _replaying = self.replay_lock.lock().await;
        tracing::info!(count = batch.len(), "Replaying queued API requests");

        while let Some(queued) = batch.pop_front() {
            if !self.offline.is_online() {
                batch.push_front(queued);
                match self.offline.requeue_front(batch) {
                    Ok(count) => {
                        tracing::warn!(count, "Connection lost during replay, requests re-queued");
                        return;
                    }
                    Err(returned) => {
                        batch = returned;
                        continue;
                    }
                }
            }

            let QueuedRequest {
                submission,
                queued_at,
                responder,
            } = queued;
            tracing::debug!(
                method = %submission.method,
                path = %submission.path,
                waited_ms = (Utc::now() - queued_at).num_milliseconds(),
                "Replaying queued request"
            );
            let result = self.dispatch(submission).await;
            // The caller may have stopped waiting
            let _ = responder.send(result);
        }
    }
}

/// Resolves the full URL and request signature.
fn prepare(config: &ClientConfig, submission: Submission) -> Result<Prepared, ApiError> {
    let Submission {
        method,
        path,
        body,
        options,
    } = submission;

    let mut url = config.base_url().join(&path);
    if !options.query.is_empty() {
        let mut parsed = reqwest::Url::parse(&url)
            .map_err(|e| ApiError::request(format!("Invalid request URL '{url}': {e}")))?;
        parsed.query_pairs_mut().extend_pairs(&options.query);
        url = parsed.to_string();
    }

    let body_fragment = body
        .as_ref()
        .map(RequestBody::signature_fragment)
        .unwrap_or_default();
    let signature = format!("{method} {url} {body_fragment}");

    Ok(Prepared {
        method,
        path,
        url,
        body,
        options,
        signature,
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
