//! Response wrapper that keeps the decoded data together with call metadata.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful API response.
///
/// Derefs to the decoded data, so most callers never touch the metadata.
///
/// # Examples
///
/// ```no_run
/// use hyperping_client::{Client, RequestContext};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Monitor {
///     uuid: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), hyperping_client::Error> {
/// let client = Client::new("sk_live_example")?;
/// let ctx = RequestContext::new();
///
/// let monitor = client.get::<Monitor>(&ctx, "/v1/monitors/mon_123").await?;
///
/// println!("Monitor: {}", monitor.name);
/// println!("Request took {:?} over {} attempt(s)", monitor.latency, monitor.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt until the successful response was read,
    /// backoff sleeps included.
    pub latency: Duration,

    /// Physical attempts made, `1` when the first try succeeded.
    pub attempts: u32,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            data,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type using the provided function.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hyperping_client::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Unwraps the data, dropping the metadata.
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hyperping_client::Response;
    /// # use http::{HeaderMap, StatusCode, HeaderValue};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new((), StatusCode::OK, headers, Duration::ZERO, 1);
    /// assert_eq!(response.header("content-type"), Some("application/json"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
