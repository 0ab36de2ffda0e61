//! Request metadata.

use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// What to call: method, path relative to the base URL, query and extra headers.
///
/// The path is used as given, so versioned families like `/v1/monitors` and
/// `/v2/outages` coexist on one client.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path (relative to the base URL).
    pub path: String,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters, in insertion order.
    pub query_params: Vec<(String, String)>,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Appends a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Appends several query parameters.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Resolves against `base`. The path is appended to any path `base`
    /// already has.
    pub(crate) fn url(&self, base: &url::Url) -> Result<url::Url, crate::Error> {
        let base = base.as_str().trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let mut url = url::Url::parse(&format!("{}/{}", base, path))?;
        if !self.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query_params);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_url_joins_path() {
        let base = Url::parse("https://api.hyperping.io").unwrap();
        let url = RequestMetadata::new(Method::GET, "/v1/monitors")
            .url(&base)
            .unwrap();
        assert_eq!(url.as_str(), "https://api.hyperping.io/v1/monitors");
    }

    #[test]
    fn test_url_keeps_base_path() {
        let base = Url::parse("http://127.0.0.1:9000/proxy/").unwrap();
        let url = RequestMetadata::new(Method::GET, "v2/outages")
            .url(&base)
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/v2/outages");
    }

    #[test]
    fn test_query_params_in_order() {
        let base = Url::parse("https://api.hyperping.io").unwrap();
        let url = RequestMetadata::new(Method::GET, "/v1/incidents")
            .with_query_param("page", "2")
            .with_query_param("status", "open now")
            .url(&base)
            .unwrap();
        assert_eq!(url.query(), Some("page=2&status=open+now"));
    }

    #[test]
    fn test_with_header_rejects_bad_value() {
        assert!(RequestMetadata::new(Method::GET, "/")
            .with_header("x-trace", "bad\nvalue")
            .is_err());
    }
}
