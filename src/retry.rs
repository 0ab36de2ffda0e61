//! Retry policy and backoff calculation.
//!
//! A [`RetryPolicy`] is owned by each client and never changes after
//! construction. It decides which HTTP statuses are worth another attempt and
//! how long to wait before making it.

use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Largest exponent used for `retry_wait_min * 2^attempt`.
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default lower bound on the wait between attempts.
pub const DEFAULT_RETRY_WAIT_MIN: Duration = Duration::from_secs(1);

/// Default upper bound on the wait between attempts.
pub const DEFAULT_RETRY_WAIT_MAX: Duration = Duration::from_secs(30);

/// HTTP statuses that are retried: 429 and the transient 5xx family.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// How many times to retry and how long to wait in between.
///
/// # Examples
///
/// ```
/// use hyperping_client::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(
///     2,
///     Duration::from_millis(100),
///     Duration::from_secs(5),
/// );
///
/// // Server hints win, capped at the maximum.
/// assert_eq!(policy.backoff(0, Some(2)), Duration::from_secs(2));
/// assert_eq!(policy.backoff(0, Some(600)), Duration::from_secs(5));
///
/// // Without a hint the wait grows exponentially and stays within bounds.
/// let wait = policy.backoff(3, None);
/// assert!(wait >= Duration::from_millis(100) && wait <= Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    wait_min: Duration,
    wait_max: Duration,
    retryable_statuses: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRIES,
            DEFAULT_RETRY_WAIT_MIN,
            DEFAULT_RETRY_WAIT_MAX,
        )
    }
}

impl RetryPolicy {
    /// Creates a policy with the default retryable status set.
    ///
    /// If `wait_max` is below `wait_min` it is raised to `wait_min`.
    pub fn new(max_retries: u32, wait_min: Duration, wait_max: Duration) -> Self {
        Self {
            max_retries,
            wait_min,
            wait_max: wait_max.max(wait_min),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
        }
    }

    /// Replaces the set of statuses that trigger a retry.
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Lower bound on the computed wait.
    pub fn wait_min(&self) -> Duration {
        self.wait_min
    }

    /// Upper bound on the computed wait.
    pub fn wait_max(&self) -> Duration {
        self.wait_max
    }

    /// Returns `true` if a response with this status should be retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Returns `true` if another attempt is allowed after `attempt` (0-indexed).
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Computes the wait before the attempt following `attempt` (0-indexed).
    ///
    /// A positive `retry_after` hint (seconds) is used as-is, capped at
    /// `wait_max`. Otherwise the wait is `wait_min * 2^attempt` capped at
    /// `wait_max`, with ±25% jitter, clamped back into `[wait_min, wait_max]`.
    pub fn backoff(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after.filter(|s| *s > 0) {
            return Duration::from_secs(seconds).min(self.wait_max);
        }

        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let wait = self
            .wait_min
            .saturating_mul(1u32 << exponent)
            .min(self.wait_max);

        let factor = rand::thread_rng().gen_range(0.75..1.25);
        Duration::try_from_secs_f64(wait.as_secs_f64() * factor)
            .unwrap_or(self.wait_max)
            .clamp(self.wait_min, self.wait_max)
    }
}
