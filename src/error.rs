//! Error types for Hyperping API calls.
//!
//! Every failure a [`Client`](crate::Client) operation can produce is an
//! [`Error`]. Callers that only care about the broad class of a failure use
//! [`Error::kind`] or the `is_*` helpers instead of matching variants.

use crate::api_error::{ApiError, ApiErrorCategory};
use crate::resource_id::ResourceIdError;
use crate::retry::DEFAULT_RETRYABLE_STATUSES;
use http::StatusCode;
use std::fmt;

/// The main error type for Hyperping API calls.
///
/// # Examples
///
/// ```no_run
/// use hyperping_client::{Client, Error, ErrorKind, RequestContext};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::new("sk_live_example")?;
/// let ctx = RequestContext::new();
///
/// match client.get::<serde_json::Value>(&ctx, "/v1/monitors/mon_123").await {
///     Ok(monitor) => println!("found: {}", monitor.data),
///     Err(e) if e.is_not_found() => println!("already gone"),
///     Err(e) if e.kind() == ErrorKind::RateLimited => eprintln!("slow down: {}", e),
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The API answered with a non-2xx status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    ///
    /// The wrapped error never carries the request URL.
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The request was about to go out over a non-HTTPS scheme.
    #[error("Refusing to send request over insecure scheme {scheme:?} to {host}")]
    InsecureTransport {
        /// The offending scheme.
        scheme: String,
        /// The target host.
        host: String,
    },

    /// A 2xx body did not decode into the expected type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The HTTP status code
        status: StatusCode,
        /// The serde error message
        serde_error: String,
        /// The raw response body that failed to deserialize
        raw_response: String,
    },

    /// The response body exceeded the size cap.
    #[error("Response body exceeds {limit} bytes")]
    ResponseTooLarge {
        /// The cap in bytes.
        limit: usize,
    },

    /// A resource ID was rejected before any request was made.
    #[error("Invalid resource ID: {0}")]
    InvalidResourceId(#[from] ResourceIdError),

    /// A request field was rejected before any request was made.
    #[error("Invalid {field}: {message}")]
    InvalidRequest {
        /// The field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The circuit breaker refused the attempt.
    #[error("Circuit breaker is open: Hyperping API appears unavailable, try again later")]
    CircuitOpen,

    /// The caller's context was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// The caller's context deadline passed.
    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err.without_url())
        }
    }
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// HTTP 404.
    NotFound,
    /// HTTP 401 or 403.
    Unauthorized,
    /// HTTP 429.
    RateLimited,
    /// HTTP 400 or 422.
    Validation,
    /// HTTP 5xx.
    ServerError,
    /// Any other non-2xx status.
    Http,
    /// Network failure, timeout or refused insecure transport.
    Transport,
    /// A response could not be decoded.
    Decode,
    /// Input rejected locally, no request made.
    LocalValidation,
    /// The circuit breaker is open.
    CircuitOpen,
    /// Cancelled or past the deadline.
    Cancelled,
    /// Bad client configuration or request construction.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate limited",
            Self::Validation => "validation",
            Self::ServerError => "server error",
            Self::Http => "http",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::LocalValidation => "local validation",
            Self::CircuitOpen => "circuit open",
            Self::Cancelled => "cancelled",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Returns the broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Api(api) => match api.category() {
                Some(ApiErrorCategory::NotFound) => ErrorKind::NotFound,
                Some(ApiErrorCategory::Unauthorized) => ErrorKind::Unauthorized,
                Some(ApiErrorCategory::RateLimited) => ErrorKind::RateLimited,
                Some(ApiErrorCategory::Validation) => ErrorKind::Validation,
                Some(ApiErrorCategory::ServerError) => ErrorKind::ServerError,
                None => ErrorKind::Http,
            },
            Error::Network(_) | Error::Timeout | Error::InsecureTransport { .. } => {
                ErrorKind::Transport
            }
            Error::DeserializationFailed { .. } | Error::ResponseTooLarge { .. } => {
                ErrorKind::Decode
            }
            Error::InvalidResourceId(_) | Error::InvalidRequest { .. } => {
                ErrorKind::LocalValidation
            }
            Error::CircuitOpen => ErrorKind::CircuitOpen,
            Error::Cancelled | Error::DeadlineExceeded => ErrorKind::Cancelled,
            Error::SerializationFailed(_) | Error::ConfigurationError(_) | Error::InvalidUrl(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// The API error, if the server answered with a non-2xx status.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }

    /// `true` for HTTP 404.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// `true` for HTTP 401 and 403.
    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    /// `true` for HTTP 429.
    pub fn is_rate_limited(&self) -> bool {
        self.kind() == ErrorKind::RateLimited
    }

    /// `true` for HTTP 400 and 422.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// `true` for HTTP 5xx.
    pub fn is_server_error(&self) -> bool {
        self.kind() == ErrorKind::ServerError
    }

    /// Returns `true` if the default retry policy would retry this error.
    ///
    /// Network errors, timeouts and statuses 429, 500, 502, 503 and 504 are
    /// retryable. Everything else, including an insecure transport, is not.
    ///
    /// # Examples
    ///
    /// ```
    /// use hyperping_client::{ApiError, Error};
    /// use http::StatusCode;
    ///
    /// let err = Error::from(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "down"));
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::from(ApiError::new(StatusCode::BAD_REQUEST, "bad"));
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::Api(api) => DEFAULT_RETRYABLE_STATUSES.contains(&api.status().as_u16()),
            _ => false,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(api) => Some(api.status()),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body of a failed decode.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for Hyperping API calls.
pub type Result<T> = std::result::Result<T, Error>;
