//! The `User-Agent` sent with every request.

/// Product token at the start of every user agent.
pub const PRODUCT: &str = "hyperping-client";

/// Upper bound on the rendered header, in bytes.
pub const MAX_USER_AGENT_LENGTH: usize = 256;

/// Builds `hyperping-client/<version> (rust; <os>/<arch>)`, followed by
/// `extra` when it is non-empty after sanitizing.
///
/// # Examples
///
/// ```
/// use hyperping_client::user_agent::build_user_agent;
///
/// let ua = build_user_agent("1.2.3", Some("ci-runner\n"));
/// assert!(ua.starts_with("hyperping-client/1.2.3 (rust; "));
/// assert!(ua.ends_with(") ci-runner"));
/// ```
pub fn build_user_agent(version: &str, extra: Option<&str>) -> String {
    let mut ua = format!(
        "{}/{} (rust; {}/{})",
        PRODUCT,
        version,
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    if let Some(extra) = extra.map(sanitize_user_agent).filter(|e| !e.is_empty()) {
        ua.push(' ');
        ua.push_str(&extra);
    }

    truncate(ua, MAX_USER_AGENT_LENGTH)
}

/// Drops control characters and surrounding whitespace, so the value can
/// never split the header.
pub fn sanitize_user_agent(value: &str) -> String {
    let cleaned: String = value.chars().filter(|c| !c.is_control()).collect();
    cleaned.trim().to_string()
}

fn truncate(mut value: String, max: usize) -> String {
    if value.len() > max {
        let mut end = max;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value.truncate(end);
    }
    value
}
