//! The request execution engine.
//!
//! The [`Client`] type is the main entry point for making Hyperping API calls.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    api_error::ApiError,
    circuit_breaker::{CircuitBreaker, CircuitState},
    config::{ClientConfig, API_KEY_ENV, BASE_URL_ENV},
    context::RequestContext,
    metadata::RequestMetadata,
    normalize::normalize_list,
    observe::{fields, Logger, Metrics, Observers},
    resource_id::validate_resource_id,
    retry::RetryPolicy,
    transport::{build_transport_chain, ReqwestTransport, Transport},
    user_agent::build_user_agent,
    Error, Response, Result,
};
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use url::Url;

/// Largest response body the client will read.
pub const MAX_RESPONSE_BODY_SIZE: usize = 10 * 1024 * 1024;

/// A Hyperping API client with retries, a circuit breaker and typed errors.
///
/// The client is cheap to clone and meant to be shared. All clones use the
/// same connection pool and the same circuit breaker.
///
/// # Examples
///
/// ```no_run
/// use hyperping_client::{Client, RequestContext, Response};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct CreateMonitor {
///     name: String,
///     url: String,
/// }
///
/// #[derive(Deserialize)]
/// struct Monitor {
///     uuid: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), hyperping_client::Error> {
/// let client = Client::builder("sk_live_example")
///     .max_retries(2)
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// let ctx = RequestContext::new().with_timeout(Duration::from_secs(60));
///
/// let created: Response<Monitor> = client
///     .post(&ctx, "/v1/monitors", &CreateMonitor {
///         name: "api".to_string(),
///         url: "https://example.com/health".to_string(),
///     })
///     .await?;
///
/// let path = Client::resource_path("/v1/monitors", &created.uuid)?;
/// let monitor: Response<Monitor> = client.get(&ctx, path).await?;
/// println!("Monitor: {}", monitor.name);
///
/// let all: Response<Vec<Monitor>> = client.list(&ctx, "/v1/monitors", "monitors").await?;
/// println!("{} monitors", all.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    retry: RetryPolicy,
    timeout: Duration,
    user_agent: HeaderValue,
    connections: Option<Semaphore>,
    breaker: CircuitBreaker,
    observers: Observers,
}

/// The raw outcome of one physical exchange.
struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Client {
    /// Creates a new `ClientBuilder` authenticating with `api_key`.
    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(api_key)
    }

    /// Creates a client with the default configuration.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// The base URL every path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The retry policy in effect.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// Current state of the shared circuit breaker.
    pub fn circuit_state(&self) -> CircuitState {
        self.inner.breaker.state()
    }

    /// Validates `id` and joins it onto `base`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hyperping_client::Client;
    ///
    /// assert_eq!(
    ///     Client::resource_path("/v1/monitors", "mon_abc123").unwrap(),
    ///     "/v1/monitors/mon_abc123"
    /// );
    /// assert!(Client::resource_path("/v1/monitors", "../admin").is_err());
    /// ```
    pub fn resource_path(base: &str, id: &str) -> Result<String> {
        validate_resource_id(id)?;
        Ok(format!("{}/{}", base.trim_end_matches('/'), id))
    }

    /// Makes a typed API call.
    ///
    /// `body` is serialized to JSON once. Each attempt passes through the
    /// circuit breaker and the transport chain. Transport errors and
    /// retryable statuses are retried with backoff; the last error is
    /// returned as is once attempts run out. A 2xx body is decoded into
    /// `Res`, an empty one as JSON `null`.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] / [`Error::DeadlineExceeded`] as soon as `ctx`
    ///   is done, including before the first attempt.
    /// - [`Error::CircuitOpen`] when the breaker refuses an attempt.
    /// - [`Error::Api`] for a non-2xx status that is not retried further.
    /// - [`Error::Network`] / [`Error::Timeout`] for the last transport failure.
    /// - [`Error::ResponseTooLarge`] / [`Error::DeserializationFailed`] for
    ///   unusable bodies.
    ///
    /// Retried POSTs may reach the server more than once. An attempt still in
    /// flight when `ctx` finishes is abandoned without being counted by the
    /// circuit breaker.
    pub async fn call<Req, Res>(
        &self,
        ctx: &RequestContext,
        metadata: RequestMetadata,
        body: Option<&Req>,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let raw = self.execute(ctx, &metadata, body).await?;
        let data = decode(raw.status, &raw.data)?;
        Ok(raw.map(|_| data))
    }

    /// Runs the retry loop and returns the raw 2xx body.
    async fn execute<Req>(
        &self,
        ctx: &RequestContext,
        metadata: &RequestMetadata,
        body: Option<&Req>,
    ) -> Result<Response<Vec<u8>>>
    where
        Req: Serialize + ?Sized,
    {
        ctx.check()?;

        let url = metadata.url(&self.inner.base_url)?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| Error::SerializationFailed(e.to_string()))?;

        let start_time = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            ctx.check()?;

            let permit = self.inner.breaker.try_acquire().map_err(|rejected| {
                tracing::warn!(
                    state = %rejected.state,
                    method = %metadata.method,
                    path = %metadata.path,
                    "Circuit breaker rejected request"
                );
                Error::CircuitOpen
            })?;

            tracing::debug!(
                method = %metadata.method,
                path = %metadata.path,
                attempt = attempt + 1,
                "Sending API request"
            );
            self.inner.observers.log(
                Some(ctx),
                "sending API request",
                fields! {
                    "method" => metadata.method.as_str(),
                    "path" => metadata.path.as_str(),
                    "attempt" => attempt + 1,
                },
            );

            let request = self.build_request(metadata, url.clone(), body.as_deref());
            let attempt_start = Instant::now();

            // Dropping the permit here releases it without counting.
            let outcome = tokio::select! {
                biased;
                reason = ctx.done() => return Err(reason),
                outcome = self.exchange(request) => outcome,
            };
            let duration = attempt_start.elapsed();

            let exchange = match outcome {
                Ok(exchange) => exchange,
                Err(err @ (Error::Network(_) | Error::Timeout)) => {
                    permit.failure();
                    tracing::warn!(
                        error = %err,
                        method = %metadata.method,
                        path = %metadata.path,
                        attempt = attempt + 1,
                        duration_ms = duration.as_millis() as u64,
                        "API request failed"
                    );
                    self.inner.observers.log(
                        Some(ctx),
                        "API request failed",
                        fields! {
                            "method" => metadata.method.as_str(),
                            "path" => metadata.path.as_str(),
                            "attempt" => attempt + 1,
                            "error" => err.to_string(),
                            "duration_ms" => duration.as_millis() as u64,
                        },
                    );

                    if !self.inner.retry.has_attempts_left(attempt) {
                        return Err(err);
                    }
                    self.wait_before_retry(ctx, metadata, attempt, None).await?;
                    attempt += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let status = exchange.status;
            let retryable = self.inner.retry.is_retryable_status(status.as_u16());
            permit.record(!retryable);

            tracing::info!(
                method = %metadata.method,
                path = %metadata.path,
                status = status.as_u16(),
                attempt = attempt + 1,
                duration_ms = duration.as_millis() as u64,
                "Received API response"
            );
            self.inner.observers.api_call(
                ctx,
                &metadata.method,
                &metadata.path,
                status.as_u16(),
                duration,
            );
            self.inner.observers.log(
                Some(ctx),
                "received API response",
                fields! {
                    "method" => metadata.method.as_str(),
                    "path" => metadata.path.as_str(),
                    "status" => status.as_u16(),
                    "attempt" => attempt + 1,
                    "duration_ms" => duration.as_millis() as u64,
                },
            );

            if status.is_success() {
                return Ok(Response::new(
                    exchange.body,
                    status,
                    exchange.headers,
                    start_time.elapsed(),
                    attempt + 1,
                ));
            }

            let api_error = ApiError::classify(status, &exchange.headers, &exchange.body);
            if !retryable || !self.inner.retry.has_attempts_left(attempt) {
                if status.is_server_error() {
                    tracing::warn!(
                        status = status.as_u16(),
                        error = %api_error,
                        "Server error (5xx)"
                    );
                } else {
                    tracing::debug!(
                        status = status.as_u16(),
                        error = %api_error,
                        "Client error (4xx)"
                    );
                }
                return Err(api_error.into());
            }

            self.wait_before_retry(ctx, metadata, attempt, api_error.retry_after())
                .await?;
            attempt += 1;
        }
    }

    async fn wait_before_retry(
        &self,
        ctx: &RequestContext,
        metadata: &RequestMetadata,
        attempt: u32,
        retry_after: Option<u64>,
    ) -> Result<()> {
        let delay = self.inner.retry.backoff(attempt, retry_after);

        tracing::info!(
            method = %metadata.method,
            path = %metadata.path,
            delay_ms = delay.as_millis() as u64,
            retry_after = retry_after,
            next_attempt = attempt + 2,
            "Retrying API request after delay"
        );
        self.inner.observers.log(
            Some(ctx),
            "retrying API request",
            fields! {
                "method" => metadata.method.as_str(),
                "path" => metadata.path.as_str(),
                "attempt" => attempt + 2,
                "delay_ms" => delay.as_millis() as u64,
            },
        );
        self.inner
            .observers
            .retry(ctx, &metadata.method, &metadata.path, attempt + 1);

        ctx.sleep(delay).await
    }

    fn build_request(
        &self,
        metadata: &RequestMetadata,
        url: Url,
        body: Option<&[u8]>,
    ) -> reqwest::Request {
        let mut request = reqwest::Request::new(metadata.method.clone(), url);

        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, self.inner.user_agent.clone());
        for (name, value) in &metadata.headers {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(body) = body {
            *request.body_mut() = Some(reqwest::Body::from(body.to_vec()));
        }
        request
    }

    /// Sends one request and reads its body, all within the attempt timeout.
    ///
    /// A connection slot is held from send until the body is read. Waiting
    /// for the slot does not count against the timeout.
    async fn exchange(&self, request: reqwest::Request) -> Result<Exchange> {
        let _slot = match &self.inner.connections {
            Some(connections) => Some(connections.acquire().await.map_err(|_| {
                Error::ConfigurationError("connection limiter closed".to_string())
            })?),
            None => None,
        };

        let exchange = async {
            let response = self.inner.transport.send(request).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = read_capped(response, MAX_RESPONSE_BODY_SIZE).await?;
            Ok::<_, Error>(Exchange {
                status,
                headers,
                body,
            })
        };

        tokio::time::timeout(self.inner.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Makes a GET request to the specified path.
    pub async fn get<Res>(
        &self,
        ctx: &RequestContext,
        path: impl Into<String>,
    ) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::GET, path);
        self.call::<(), Res>(ctx, metadata, None).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(
        &self,
        ctx: &RequestContext,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::POST, path);
        self.call(ctx, metadata, Some(body)).await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(
        &self,
        ctx: &RequestContext,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::PUT, path);
        self.call(ctx, metadata, Some(body)).await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        ctx: &RequestContext,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::PATCH, path);
        self.call(ctx, metadata, Some(body)).await
    }

    /// Makes a DELETE request. Whatever body comes back is discarded.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        path: impl Into<String>,
    ) -> Result<Response<()>> {
        let metadata = RequestMetadata::new(Method::DELETE, path);
        let response = self.execute::<()>(ctx, &metadata, None).await?;
        Ok(response.map(|_| ()))
    }

    /// GETs a list endpoint and normalizes its envelope.
    ///
    /// See [`normalize_list`] for the accepted shapes.
    pub async fn list<T>(
        &self,
        ctx: &RequestContext,
        path: impl Into<String>,
        resource_key: &str,
    ) -> Result<Response<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        self.list_with(ctx, RequestMetadata::new(Method::GET, path), resource_key)
            .await
    }

    /// Like [`Client::list`] with caller-built metadata, for query parameters.
    pub async fn list_with<T>(
        &self,
        ctx: &RequestContext,
        metadata: RequestMetadata,
        resource_key: &str,
    ) -> Result<Response<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        let raw = self.execute::<()>(ctx, &metadata, None).await?;
        let items = if raw.data.is_empty() {
            Vec::new()
        } else {
            normalize_list(&raw.data, resource_key)
                .map_err(|e| decode_error(raw.status, &raw.data, e))?
        };
        Ok(raw.map(|_| items))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("retry", &self.inner.retry)
            .field("timeout", &self.inner.timeout)
            .field("breaker", &self.inner.breaker)
            .field("observers", &self.inner.observers)
            .finish_non_exhaustive()
    }
}

/// Rejects `value` if it is longer than `max` characters.
///
/// # Examples
///
/// ```
/// use hyperping_client::validate_field_length;
///
/// assert!(validate_field_length("name", "api", 255).is_ok());
/// assert!(validate_field_length("name", &"x".repeat(256), 255).is_err());
/// ```
pub fn validate_field_length(field: &str, value: &str, max: usize) -> Result<()> {
    let length = value.chars().count();
    if length > max {
        return Err(Error::InvalidRequest {
            field: field.to_string(),
            message: format!("must be at most {} characters, got {}", max, length),
        });
    }
    Ok(())
}

async fn read_capped(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(Error::ResponseTooLarge { limit });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(Error::ResponseTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn decode<Res>(status: StatusCode, body: &[u8]) -> Result<Res>
where
    Res: DeserializeOwned,
{
    let decoded = if body.is_empty() {
        serde_json::from_value(serde_json::Value::Null)
    } else {
        serde_json::from_slice(body)
    };

    decoded.map_err(|e| decode_error(status, body, e))
}

fn decode_error(status: StatusCode, body: &[u8], err: serde_json::Error) -> Error {
    let raw_response = String::from_utf8_lossy(body).into_owned();
    tracing::error!(
        status = status.as_u16(),
        error = %err,
        raw_response = %raw_response,
        "Failed to deserialize response"
    );
    Error::DeserializationFailed {
        status,
        serde_error: err.to_string(),
        raw_response,
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use hyperping_client::{Client, circuit_breaker::CircuitBreakerConfig};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), hyperping_client::Error> {
/// let client = Client::builder("sk_live_example")
///     .base_url("https://api.hyperping.io")
///     .max_retries(5)
///     .retry_wait(Duration::from_millis(500), Duration::from_secs(20))
///     .circuit_breaker(CircuitBreakerConfig {
///         failure_ratio: 0.5,
///         ..CircuitBreakerConfig::default()
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    api_key: String,
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    logger: Option<Arc<dyn Logger>>,
    metrics: Option<Arc<dyn Metrics>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            config: ClientConfig::default(),
            transport: None,
            logger: None,
            metrics: None,
        }
    }

    /// Reads the API key from `HYPERPING_API_KEY` and, if set, the base URL
    /// from `HYPERPING_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or not Unicode.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|e| {
            Error::ConfigurationError(format!("{} is not usable: {}", API_KEY_ENV, e))
        })?;
        let mut builder = Self::new(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            builder = builder.base_url(base_url);
        }
        Ok(builder)
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the base URL for all requests. Checked in [`build`](Self::build).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets how many times a failed attempt is retried.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Sets the backoff bounds.
    pub fn retry_wait(mut self, min: Duration, max: Duration) -> Self {
        self.config.retry_wait_min = min;
        self.config.retry_wait_max = max;
        self
    }

    /// Replaces the set of retried statuses.
    pub fn retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.config.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Sets the version reported in the User-Agent.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    /// Sets (or with `None`, disables) the environment variable read for a
    /// User-Agent suffix.
    pub fn user_agent_env(mut self, name: Option<String>) -> Self {
        self.config.user_agent_env = name;
        self
    }

    /// Sets connection pool limits. The in-flight cap applies to custom
    /// transports too.
    pub fn pool(mut self, pool: crate::transport::PoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    /// Sets circuit breaker tuning.
    pub fn circuit_breaker(
        mut self,
        breaker: crate::circuit_breaker::CircuitBreakerConfig,
    ) -> Self {
        self.config.breaker = breaker;
        self
    }

    /// Replaces the built-in transport. TLS enforcement and auth are still
    /// layered on top.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the logger collaborator.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the metrics collaborator.
    pub fn metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty, the configuration is
    /// inconsistent, or the HTTP client cannot be created.
    pub fn build(self) -> Result<Client> {
        if self.api_key.trim().is_empty() {
            return Err(Error::ConfigurationError("API key is required".to_string()));
        }
        let base_url = self.config.validate()?;

        let base: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&base_url, &self.config.pool)?),
        };
        let transport = build_transport_chain(&self.api_key, base, &base_url)?;

        let suffix = self
            .config
            .user_agent_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok());
        let user_agent =
            HeaderValue::try_from(build_user_agent(&self.config.version, suffix.as_deref()))
                .map_err(|e| Error::ConfigurationError(format!("Invalid User-Agent: {}", e)))?;

        let limit = self.config.pool.max_connections_per_host;
        let connections = (limit > 0).then(|| Semaphore::new(limit));

        let observers = Observers {
            logger: self.logger,
            metrics: self.metrics,
        };
        let listener = observers.clone();
        let breaker = CircuitBreaker::with_listener(self.config.breaker.clone(), move |from, to| {
            listener.breaker_transition(from, to)
        });

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                retry: self.config.retry_policy(),
                timeout: self.config.timeout,
                user_agent,
                connections,
                breaker,
                observers,
            }),
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("api_key", &"<redacted>")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}
