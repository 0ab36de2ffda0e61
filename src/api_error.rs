//! Classification of failed HTTP exchanges.
//!
//! Every non-2xx response is turned into an [`ApiError`]: the status code, a
//! human message, optional field-level validation details and, for `429`
//! responses, the server's retry hint. Callers test the broad category with
//! [`ApiError::matches`] instead of matching exact status codes.

use crate::rate_limit::parse_retry_after;
use http::{HeaderMap, StatusCode};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;

/// Broad categories a classified [`ApiError`] can belong to.
///
/// A status code belongs to at most one category; codes outside all of them
/// (for example `418` or `409`) belong to none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorCategory {
    /// `404`.
    NotFound,
    /// `401` or `403`.
    Unauthorized,
    /// `429`.
    RateLimited,
    /// `400` or `422`.
    Validation,
    /// Any `5xx`.
    ServerError,
}

impl ApiErrorCategory {
    /// Returns the category of a status code, if it has one.
    pub fn of(status: StatusCode) -> Option<Self> {
        match status.as_u16() {
            404 => Some(Self::NotFound),
            401 | 403 => Some(Self::Unauthorized),
            429 => Some(Self::RateLimited),
            400 | 422 => Some(Self::Validation),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for ApiErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "resource not found",
            Self::Unauthorized => "unauthorized: invalid or missing API key",
            Self::RateLimited => "rate limit exceeded",
            Self::Validation => "validation error",
            Self::ServerError => "server error",
        };
        f.write_str(name)
    }
}

/// A field-level validation problem reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidationDetail {
    /// The offending request field.
    #[serde(default)]
    pub field: String,
    /// What was wrong with it.
    #[serde(default)]
    pub message: String,
}

/// An error response returned by the API.
///
/// Values are created once per failed exchange and never mutated.
///
/// # Examples
///
/// ```
/// use hyperping_client::{ApiError, ApiErrorCategory};
/// use http::{HeaderMap, StatusCode};
///
/// let err = ApiError::classify(
///     StatusCode::NOT_FOUND,
///     &HeaderMap::new(),
///     br#"{"error":"monitor not found"}"#,
/// );
///
/// assert!(err.matches(ApiErrorCategory::NotFound));
/// assert!(!err.matches(ApiErrorCategory::ServerError));
/// assert_eq!(err.message(), "monitor not found");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Vec<ValidationDetail>,
    retry_after: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<Vec<ValidationDetail>>,
}

impl ApiError {
    /// Creates an error with a status and message and nothing else.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Vec::new(),
            retry_after: None,
        }
    }

    /// Attaches field-level validation details.
    pub fn with_details(mut self, details: Vec<ValidationDetail>) -> Self {
        self.details = details;
        self
    }

    /// Attaches a retry hint in seconds. Zero means no hint.
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = (seconds > 0).then_some(seconds);
        self
    }

    /// Classifies a failed response.
    ///
    /// The message prefers the body's `message` field, then its `error`
    /// field, and falls back to the canonical reason phrase of the status.
    /// Bodies that are not the structured error shape are ignored. The
    /// `Retry-After` header is only consulted for `429` responses.
    pub fn classify(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Self {
        let mut err = Self::new(status, status.canonical_reason().unwrap_or("unknown status"));

        if status == StatusCode::TOO_MANY_REQUESTS {
            err.retry_after = parse_retry_after(headers);
        }

        if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
            let error = parsed.error.filter(|s| !s.is_empty());
            let message = parsed.message.filter(|s| !s.is_empty());
            if let Some(error) = &error {
                err.message = error.clone();
            }
            if let Some(message) = message {
                if error.as_deref() != Some(message.as_str()) {
                    err.message = message;
                }
            }
            err.details = parsed.details.unwrap_or_default();
        }

        err
    }

    /// The HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The unsanitized message. Use `Display` when logging.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Field-level validation problems, if the API reported any.
    pub fn details(&self) -> &[ValidationDetail] {
        &self.details
    }

    /// Seconds the server asked us to wait, if it said.
    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    /// The category this error belongs to, if any.
    pub fn category(&self) -> Option<ApiErrorCategory> {
        ApiErrorCategory::of(self.status)
    }

    /// Returns `true` if this error belongs to `category`.
    pub fn matches(&self, category: ApiErrorCategory) -> bool {
        self.category() == Some(category)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = sanitize_message(&self.message);
        write!(f, "API error (status {}): {}", self.status.as_u16(), message)?;

        if self.status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(seconds) = self.retry_after {
                let unit = if seconds == 1 { "second" } else { "seconds" };
                return write!(f, " - retry after {} {}", seconds, unit);
            }
        }

        if !self.details.is_empty() {
            write!(f, " - {} validation errors", self.details.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

static API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sk_[a-zA-Z0-9_-]+").expect("valid regex"));
static AUTH_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Authorization:\s+Bearer\s+\S+").expect("valid regex"));
static BEARER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bearer\s+(?:\S*[0-9_-]\S*|\S{32,})").expect("valid regex")
});
static URL_CREDENTIALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"://[^:/\s]+:[^@\s]+@").expect("valid regex"));

/// Redacts credentials that a server might echo back in an error message.
pub(crate) fn sanitize_message(message: &str) -> String {
    let message = API_KEY.replace_all(message, "sk_***REDACTED***");
    let message = AUTH_HEADER.replace_all(&message, "Authorization: ***REDACTED***");
    let message = BEARER.replace_all(&message, "Bearer ***REDACTED***");
    URL_CREDENTIALS
        .replace_all(&message, "://***REDACTED***@")
        .into_owned()
}
