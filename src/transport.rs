//! The layered transport every request goes through.
//!
//! ```text
//! base transport → TLS enforcement → auth injection
//! ```
//!
//! The base is either the built-in [`ReqwestTransport`] (connection pooling,
//! minimum TLS version) or a caller-supplied [`Transport`]. Either way
//! [`build_transport_chain`] wraps it, so a custom transport can never skip
//! the HTTPS check or the Authorization header.

use crate::{Error, Result};
use futures::future::BoxFuture;
use http::header::AUTHORIZATION;
use http::HeaderValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

/// Sends one HTTP request and returns the response head.
///
/// Implementations must be safe to call from many tasks at once.
pub trait Transport: Send + Sync {
    /// Performs a single physical exchange. No retries.
    fn send(&self, request: reqwest::Request) -> BoxFuture<'_, Result<reqwest::Response>>;
}

/// Connection pool limits for the built-in transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
    /// Exchanges allowed in flight per host, counted from sending the
    /// request until its body has been read. Zero means no cap.
    pub max_connections_per_host: usize,
    /// How long an idle connection is kept.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            max_connections_per_host: 20,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// The default transport, backed by `reqwest`.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a pooled client for `base_url`.
    ///
    /// Non-local targets are restricted to HTTPS with TLS 1.2 or newer. The
    /// in-flight cap of `pool` is enforced by the client around each whole
    /// exchange, not here.
    pub fn new(base_url: &Url, pool: &PoolConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_idle_timeout(pool.idle_timeout)
            .min_tls_version(reqwest::tls::Version::TLS_1_2);

        if !is_local(base_url) {
            builder = builder.https_only(true);
        }

        let client = builder.build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }

    /// Wraps an already configured `reqwest::Client`.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: reqwest::Request) -> BoxFuture<'_, Result<reqwest::Response>> {
        Box::pin(async move { Ok::<_, Error>(self.client.execute(request).await?) })
    }
}

/// Refuses any request that is not HTTPS.
pub struct TlsEnforcedTransport {
    next: Arc<dyn Transport>,
}

impl TlsEnforcedTransport {
    /// Wraps `next`.
    pub fn new(next: Arc<dyn Transport>) -> Self {
        Self { next }
    }
}

impl Transport for TlsEnforcedTransport {
    fn send(&self, request: reqwest::Request) -> BoxFuture<'_, Result<reqwest::Response>> {
        let url = request.url();
        if url.scheme() != "https" {
            let err = Error::InsecureTransport {
                scheme: url.scheme().to_string(),
                host: url.host_str().unwrap_or_default().to_string(),
            };
            return Box::pin(async move { Err::<reqwest::Response, _>(err) });
        }
        self.next.send(request)
    }
}

/// Sets `Authorization: Bearer <key>` on every request.
///
/// The header value is marked sensitive and never rendered by `Debug`.
pub struct AuthTransport {
    authorization: HeaderValue,
    next: Arc<dyn Transport>,
}

impl AuthTransport {
    /// Wraps `next`, authenticating with `api_key`.
    pub fn new(api_key: &str, next: Arc<dyn Transport>) -> Result<Self> {
        let mut authorization =
            HeaderValue::try_from(format!("Bearer {}", api_key)).map_err(|_| {
                Error::ConfigurationError("API key is not a valid header value".to_string())
            })?;
        authorization.set_sensitive(true);
        Ok(Self {
            authorization,
            next,
        })
    }
}

impl Transport for AuthTransport {
    fn send(&self, mut request: reqwest::Request) -> BoxFuture<'_, Result<reqwest::Response>> {
        request
            .headers_mut()
            .insert(AUTHORIZATION, self.authorization.clone());
        self.next.send(request)
    }
}

impl fmt::Debug for AuthTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTransport")
            .field("authorization", &"<redacted>")
            .finish()
    }
}

/// Composes `base → TLS enforcement → auth` for requests to `base_url`.
///
/// Loopback targets skip TLS enforcement so tests can use plain HTTP mock
/// servers.
pub fn build_transport_chain(
    api_key: &str,
    base: Arc<dyn Transport>,
    base_url: &Url,
) -> Result<Arc<dyn Transport>> {
    let enforced: Arc<dyn Transport> = if is_local(base_url) {
        base
    } else {
        Arc::new(TlsEnforcedTransport::new(base))
    };
    Ok(Arc::new(AuthTransport::new(api_key, enforced)?))
}

/// Returns `true` for `localhost` and loopback addresses.
pub fn is_local(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
