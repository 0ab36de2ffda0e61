//! `Retry-After` header parsing.
//!
//! The API sends `Retry-After` on `429` responses, either as delay-seconds or
//! as an HTTP date. Anything that does not describe a positive wait in the
//! future is treated as "no hint" so the caller falls back to exponential
//! backoff.

use http::HeaderMap;
use std::time::SystemTime;

/// Parses the `Retry-After` header into whole seconds.
///
/// Returns `None` when the header is missing, malformed, zero or negative,
/// or names a date that has already passed.
///
/// # Examples
///
/// ```
/// use hyperping_client::rate_limit::parse_retry_after;
/// use http::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("retry-after", "60".parse().unwrap());
/// assert_eq!(parse_retry_after(&headers), Some(60));
///
/// headers.insert("retry-after", "-5".parse().unwrap());
/// assert_eq!(parse_retry_after(&headers), None);
/// ```
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let header = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after_value(header)
}

/// Parses a raw `Retry-After` value. See [`parse_retry_after`].
pub fn parse_retry_after_value(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    // delay-seconds
    if let Ok(seconds) = trimmed.parse::<i64>() {
        return u64::try_from(seconds).ok().filter(|s| *s > 0);
    }

    // HTTP-date (IMF-fixdate, RFC 850 or asctime)
    let date = httpdate::parse_http_date(trimmed).ok()?;
    let until = date.duration_since(SystemTime::now()).ok()?;
    Some(until.as_secs()).filter(|s| *s > 0)
}
