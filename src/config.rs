//! Client configuration.
//!
//! [`ClientConfig`] is a plain struct with defaults. It is usually edited
//! through [`ClientBuilder`](crate::ClientBuilder) setters and frozen when
//! the client is built.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::{
    RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_STATUSES, DEFAULT_RETRY_WAIT_MAX,
    DEFAULT_RETRY_WAIT_MIN,
};
use crate::transport::PoolConfig;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::time::Duration;
use url::Url;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.hyperping.io";

/// Per-attempt timeout, body read included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable whose value is appended to the User-Agent.
pub const USER_AGENT_ENV: &str = "TF_APPEND_USER_AGENT";

/// Environment variable read by [`ClientBuilder::from_env`](crate::ClientBuilder::from_env).
pub const API_KEY_ENV: &str = "HYPERPING_API_KEY";

/// Environment variable that overrides the base URL in
/// [`ClientBuilder::from_env`](crate::ClientBuilder::from_env).
pub const BASE_URL_ENV: &str = "HYPERPING_BASE_URL";

/// Everything a [`Client`](crate::Client) is built from, except the API key
/// and injected collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Scheme, host and optional path prefix of the API.
    pub base_url: String,
    /// Upper bound on one physical attempt.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Lower bound on any computed backoff.
    pub retry_wait_min: Duration,
    /// Upper bound on any backoff, server hints included.
    pub retry_wait_max: Duration,
    /// Statuses that are retried and count as breaker failures.
    pub retryable_statuses: BTreeSet<u16>,
    /// Version reported in the User-Agent.
    pub version: String,
    /// Environment variable holding a User-Agent suffix. `None` disables it.
    pub user_agent_env: Option<String>,
    /// Connection pool limits.
    pub pool: PoolConfig,
    /// Circuit breaker tuning.
    pub breaker: CircuitBreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait_min: DEFAULT_RETRY_WAIT_MIN,
            retry_wait_max: DEFAULT_RETRY_WAIT_MAX,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            user_agent_env: Some(USER_AGENT_ENV.to_string()),
            pool: PoolConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Checks the settings and returns the parsed base URL.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigurationError`] for inconsistent retry or breaker
    /// settings, [`Error::InvalidUrl`] for an unparseable base URL.
    pub fn validate(&self) -> Result<Url> {
        if self.retry_wait_min > self.retry_wait_max {
            return Err(Error::ConfigurationError(format!(
                "retry_wait_min ({:?}) exceeds retry_wait_max ({:?})",
                self.retry_wait_min, self.retry_wait_max
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::ConfigurationError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if !(self.breaker.failure_ratio > 0.0 && self.breaker.failure_ratio <= 1.0) {
            return Err(Error::ConfigurationError(format!(
                "failure_ratio must be in (0, 1], got {}",
                self.breaker.failure_ratio
            )));
        }
        if self.breaker.half_open_max_requests == 0 {
            return Err(Error::ConfigurationError(
                "half_open_max_requests must be at least 1".to_string(),
            ));
        }

        let url = Url::parse(&self.base_url)?;
        if url.cannot_be_a_base() || url.host().is_none() {
            return Err(Error::ConfigurationError(format!(
                "base URL {:?} has no host",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_wait_min, self.retry_wait_max)
            .with_retryable_statuses(self.retryable_statuses.iter().copied())
    }
}
