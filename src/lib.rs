//! # hyperping-client - A resilient client for the Hyperping monitoring API
//!
//! Turns an HTTP API with transient failures and inconsistent list envelopes
//! into predictable, typed calls. Every call is retried with jittered
//! exponential backoff on transport errors and `429`/`5xx`, honors
//! `Retry-After`, passes through a circuit breaker shared by the whole
//! client, and fails with an [`Error`] whose [`kind`](Error::kind) callers
//! can branch on.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hyperping_client::{Client, RequestContext};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateMonitor {
//!     name: String,
//!     url: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Monitor {
//!     uuid: String,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hyperping_client::Error> {
//!     let client = Client::builder("sk_live_example")
//!         .timeout(Duration::from_secs(15))
//!         .build()?;
//!     let ctx = RequestContext::new().with_timeout(Duration::from_secs(120));
//!
//!     let monitors = client.list::<Monitor>(&ctx, "/v1/monitors", "monitors").await?;
//!     println!("{} monitors, fetched in {:?}", monitors.len(), monitors.latency);
//!
//!     let created = client
//!         .post::<_, Monitor>(&ctx, "/v1/monitors", &CreateMonitor {
//!             name: "checkout".to_string(),
//!             url: "https://shop.example.com/health".to_string(),
//!         })
//!         .await?;
//!
//!     let path = Client::resource_path("/v1/monitors", &created.uuid)?;
//!     client.delete(&ctx, path).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use hyperping_client::{Client, ErrorKind, RequestContext};
//!
//! # async fn example() -> Result<(), hyperping_client::Error> {
//! # let client = Client::new("sk_live_example")?;
//! # let ctx = RequestContext::new();
//! match client.get::<serde_json::Value>(&ctx, "/v1/monitors/mon_123").await {
//!     Ok(response) => println!("Monitor: {}", response.data),
//!     Err(e) => match e.kind() {
//!         ErrorKind::NotFound => println!("gone"),
//!         ErrorKind::RateLimited | ErrorKind::ServerError => {
//!             eprintln!("retries exhausted: {}", e)
//!         }
//!         ErrorKind::CircuitOpen => eprintln!("API unavailable, backing off"),
//!         _ => return Err(e),
//!     },
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Resilience
//!
//! - `max_retries` retries after the first attempt on transport errors and
//!   statuses `429, 500, 502, 503, 504`. Anything else fails immediately.
//! - Waits grow as `retry_wait_min * 2^attempt` with ±25% jitter, always
//!   within `[retry_wait_min, retry_wait_max]`. A `Retry-After` hint on a
//!   `429` is used instead, capped at `retry_wait_max`.
//! - The [`circuit_breaker`] counts every physical attempt. Once it opens,
//!   calls fail with [`Error::CircuitOpen`] without touching the network.
//! - Bodies are capped at 10 MiB.
//! - A [`RequestContext`] cancels in-flight I/O and backoff sleeps.
//!
//! Retried POSTs may create a resource twice; the API offers no idempotency
//! keys.

pub mod api_error;
pub mod circuit_breaker;
mod client;
pub mod config;
mod context;
mod error;
pub mod metadata;
pub mod normalize;
pub mod observe;
pub mod rate_limit;
pub mod resource_id;
mod response;
pub mod retry;
pub mod transport;
pub mod user_agent;

pub use api_error::{ApiError, ApiErrorCategory, ValidationDetail};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitState};
pub use client::{validate_field_length, Client, ClientBuilder, MAX_RESPONSE_BODY_SIZE};
pub use config::ClientConfig;
pub use context::RequestContext;
pub use error::{Error, ErrorKind, Result};
pub use metadata::RequestMetadata;
pub use observe::{Fields, Logger, Metrics, TracingLogger};
pub use resource_id::{validate_resource_id, ResourceIdError};
pub use response::Response;
pub use retry::RetryPolicy;
pub use transport::{PoolConfig, Transport};
