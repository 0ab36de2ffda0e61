//! Normalization of list responses.
//!
//! List endpoints are inconsistent about their envelope. Depending on the
//! resource family the same logical "list of monitors" arrives as
//!
//! ```text
//! [{...}, {...}]
//! {"monitors": [{...}, {...}]}
//! {"data": [{...}, {...}]}
//! ```
//!
//! [`normalize_list`] accepts all three and always yields a `Vec<T>`.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Generic envelope key used by several endpoints.
pub const DATA_KEY: &str = "data";

/// Decodes a list response that may be bare or wrapped.
///
/// Tries, in order: a bare array; the `resource_key` field if it holds a
/// non-empty array; the `data` field if it holds a non-empty array. If
/// neither field yields elements the result is an empty vector. Malformed
/// JSON, or elements that do not decode as `T`, are errors.
///
/// # Examples
///
/// ```
/// use hyperping_client::normalize::normalize_list;
///
/// let bare: Vec<u32> = normalize_list(b"[1, 2]", "monitors").unwrap();
/// let named: Vec<u32> = normalize_list(br#"{"monitors": [1, 2]}"#, "monitors").unwrap();
/// let data: Vec<u32> = normalize_list(br#"{"data": [1, 2]}"#, "monitors").unwrap();
/// assert_eq!(bare, named);
/// assert_eq!(named, data);
///
/// assert!(normalize_list::<u32>(b"{not json", "monitors").is_err());
/// ```
pub fn normalize_list<T>(raw: &[u8], resource_key: &str) -> Result<Vec<T>, serde_json::Error>
where
    T: DeserializeOwned,
{
    let value: Value = serde_json::from_slice(raw)?;
    normalize_list_value(value, resource_key)
}

/// Same as [`normalize_list`] for an already parsed document.
///
/// `null` is treated as an empty list.
pub fn normalize_list_value<T>(
    value: Value,
    resource_key: &str,
) -> Result<Vec<T>, serde_json::Error>
where
    T: DeserializeOwned,
{
    let mut object = match value {
        Value::Array(_) => return serde_json::from_value(value),
        Value::Object(object) => object,
        Value::Null => return Ok(Vec::new()),
        other => return serde_json::from_value(other),
    };

    let named = take_list::<T>(object.remove(resource_key))?;
    if !named.is_empty() {
        return Ok(named);
    }

    take_list(object.remove(DATA_KEY))
}

fn take_list<T>(value: Option<Value>) -> Result<Vec<T>, serde_json::Error>
where
    T: DeserializeOwned,
{
    let items = value
        .map(serde_json::from_value::<Option<Vec<T>>>)
        .transpose()?
        .flatten();
    Ok(items.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Monitor {
        uuid: String,
    }

    fn uuids(monitors: &[Monitor]) -> Vec<&str> {
        monitors.iter().map(|m| m.uuid.as_str()).collect()
    }

    #[test]
    fn test_empty_array_is_empty_list() {
        let monitors: Vec<Monitor> = normalize_list(b"[]", "monitors").unwrap();
        assert!(monitors.is_empty());
    }

    #[test]
    fn test_bare_array() {
        let monitors: Vec<Monitor> =
            normalize_list(br#"[{"uuid":"mon_1"},{"uuid":"mon_2"}]"#, "monitors").unwrap();
        assert_eq!(uuids(&monitors), ["mon_1", "mon_2"]);
    }

    #[test]
    fn test_data_envelope() {
        let monitors: Vec<Monitor> =
            normalize_list(br#"{"data":[{"uuid":"mon_1"}]}"#, "monitors").unwrap();
        assert_eq!(uuids(&monitors), ["mon_1"]);
    }

    #[test]
    fn test_resource_key_preferred_over_data() {
        let monitors: Vec<Monitor> = normalize_list(
            br#"{"monitors":[{"uuid":"named"}],"data":[{"uuid":"generic"}]}"#,
            "monitors",
        )
        .unwrap();
        assert_eq!(uuids(&monitors), ["named"]);
    }

    #[test]
    fn test_empty_resource_key_falls_back_to_data() {
        let monitors: Vec<Monitor> = normalize_list(
            br#"{"monitors":[],"data":[{"uuid":"generic"}]}"#,
            "monitors",
        )
        .unwrap();
        assert_eq!(uuids(&monitors), ["generic"]);
    }

    #[test]
    fn test_object_without_known_keys_is_empty_list() {
        let monitors: Vec<Monitor> =
            normalize_list(br#"{"total": 0, "monitors": null}"#, "monitors").unwrap();
        assert!(monitors.is_empty());

        let monitors: Vec<Monitor> = normalize_list(b"{}", "monitors").unwrap();
        assert!(monitors.is_empty());
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(normalize_list::<Monitor>(b"[{\"uuid\":", "monitors").is_err());
        assert!(normalize_list::<Monitor>(b"", "monitors").is_err());
    }

    #[test]
    fn test_mistyped_elements_are_error() {
        assert!(normalize_list::<Monitor>(br#"[{"uuid": 5}]"#, "monitors").is_err());
        assert!(normalize_list::<Monitor>(br#"{"data": "nope"}"#, "monitors").is_err());
        assert!(normalize_list::<Monitor>(b"42", "monitors").is_err());
    }
}
