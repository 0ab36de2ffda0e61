//! Validation of caller-supplied resource IDs.
//!
//! IDs end up as URL path segments, so anything that could escape the
//! segment (traversal, query or fragment injection, authority override) is
//! rejected locally before a request is ever built.

use regex::Regex;
use std::sync::LazyLock;

/// Longest accepted resource ID, in bytes.
pub const MAX_RESOURCE_ID_LENGTH: usize = 128;

static RESOURCE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid regex"));

/// Why a resource ID was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceIdError {
    /// The ID was empty.
    #[error("resource ID must not be empty")]
    Empty,

    /// The ID exceeded [`MAX_RESOURCE_ID_LENGTH`].
    #[error("invalid resource ID: length {length} exceeds maximum of {max}")]
    TooLong {
        /// Length of the rejected ID.
        length: usize,
        /// The limit.
        max: usize,
    },

    /// The ID contained `..` or `/`.
    #[error("invalid resource ID {0:?}: path traversal not allowed")]
    PathTraversal(String),

    /// The ID contained one of `? # @ & =`.
    #[error("invalid resource ID {0:?}: URL metacharacters not allowed")]
    UrlMetacharacters(String),

    /// The ID did not match `[A-Za-z0-9][A-Za-z0-9_-]*`.
    #[error("invalid resource ID {0:?}: must match [a-zA-Z0-9_-]")]
    InvalidCharacters(String),
}

/// Checks that `id` is safe to use as a URL path segment.
///
/// # Examples
///
/// ```
/// use hyperping_client::validate_resource_id;
///
/// assert!(validate_resource_id("mon_abc123").is_ok());
/// assert!(validate_resource_id("../../etc").is_err());
/// assert!(validate_resource_id("id?x=1").is_err());
/// assert!(validate_resource_id("").is_err());
/// ```
pub fn validate_resource_id(id: &str) -> Result<(), ResourceIdError> {
    if id.is_empty() {
        return Err(ResourceIdError::Empty);
    }

    // Length is checked first so oversized input is never echoed back.
    if id.len() > MAX_RESOURCE_ID_LENGTH {
        return Err(ResourceIdError::TooLong {
            length: id.len(),
            max: MAX_RESOURCE_ID_LENGTH,
        });
    }

    if id.contains("..") || id.contains('/') {
        return Err(ResourceIdError::PathTraversal(id.to_string()));
    }

    if id.contains(&['?', '#', '@', '&', '='][..]) {
        return Err(ResourceIdError::UrlMetacharacters(id.to_string()));
    }

    if !RESOURCE_ID_PATTERN.is_match(id) {
        return Err(ResourceIdError::InvalidCharacters(id.to_string()));
    }

    Ok(())
}
