//! Optional logging and metrics collaborators.
//!
//! The client always emits `tracing` events. Callers who need the same events
//! in another logging framework, or who want call/retry/breaker metrics,
//! plug in a [`Logger`] or [`Metrics`] implementation. Both are invoked from
//! many tasks at once and must not block.

use crate::circuit_breaker::CircuitState;
use crate::context::RequestContext;
use http::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Structured key/value fields attached to a log event.
pub type Fields = BTreeMap<&'static str, Value>;

/// Receives debug events for requests, responses, retries and circuit-breaker
/// transitions.
///
/// `ctx` is `None` for events that are not tied to a single call, such as
/// breaker state changes.
pub trait Logger: Send + Sync {
    /// Records one event.
    fn debug(&self, ctx: Option<&RequestContext>, message: &str, fields: &Fields);
}

/// Receives operational metrics.
pub trait Metrics: Send + Sync {
    /// One physical HTTP exchange completed with `status`.
    fn record_api_call(
        &self,
        ctx: &RequestContext,
        method: &Method,
        path: &str,
        status: u16,
        duration: Duration,
    );

    /// Attempt number `attempt` (1-indexed, the retry itself) is about to be made.
    fn record_retry(&self, ctx: &RequestContext, method: &Method, path: &str, attempt: u32);

    /// The circuit breaker moved to `state`.
    fn record_circuit_breaker_state(&self, state: CircuitState);
}

/// A [`Logger`] that forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, _ctx: Option<&RequestContext>, message: &str, fields: &Fields) {
        tracing::debug!(fields = ?fields, "{}", message);
    }
}

/// Fan-out to the optional collaborators. Missing ones are no-ops.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    pub(crate) logger: Option<Arc<dyn Logger>>,
    pub(crate) metrics: Option<Arc<dyn Metrics>>,
}

impl Observers {
    pub(crate) fn log(&self, ctx: Option<&RequestContext>, message: &str, fields: Fields) {
        if let Some(logger) = &self.logger {
            logger.debug(ctx, message, &fields);
        }
    }

    pub(crate) fn api_call(
        &self,
        ctx: &RequestContext,
        method: &Method,
        path: &str,
        status: u16,
        duration: Duration,
    ) {
        if let Some(metrics) = &self.metrics {
            metrics.record_api_call(ctx, method, path, status, duration);
        }
    }

    pub(crate) fn retry(&self, ctx: &RequestContext, method: &Method, path: &str, attempt: u32) {
        if let Some(metrics) = &self.metrics {
            metrics.record_retry(ctx, method, path, attempt);
        }
    }

    pub(crate) fn breaker_transition(&self, from: CircuitState, to: CircuitState) {
        tracing::info!(from = %from, to = %to, "Circuit breaker state change");

        let mut fields = Fields::new();
        fields.insert("from", Value::from(from.to_string()));
        fields.insert("to", Value::from(to.to_string()));
        self.log(None, "circuit breaker state change", fields);

        if let Some(metrics) = &self.metrics {
            metrics.record_circuit_breaker_state(to);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("logger", &self.logger.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// Builds a [`Fields`] map from `key => value` pairs.
macro_rules! fields {
    ($($key:literal => $value:expr),* $(,)?) => {{
        let mut fields = $crate::observe::Fields::new();
        $(fields.insert($key, ::serde_json::Value::from($value));)*
        fields
    }};
}

pub(crate) use fields;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(String, Fields)>>,
        states: Mutex<Vec<CircuitState>>,
    }

    impl Logger for Recorder {
        fn debug(&self, _ctx: Option<&RequestContext>, message: &str, fields: &Fields) {
            self.events
                .lock()
                .unwrap()
                .push((message.to_string(), fields.clone()));
        }
    }

    impl Metrics for Recorder {
        fn record_api_call(&self, _: &RequestContext, _: &Method, _: &str, _: u16, _: Duration) {}
        fn record_retry(&self, _: &RequestContext, _: &Method, _: &str, _: u32) {}
        fn record_circuit_breaker_state(&self, state: CircuitState) {
            self.states.lock().unwrap().push(state);
        }
    }

    #[test]
    fn test_missing_collaborators_are_noops() {
        let observers = Observers::default();
        let ctx = RequestContext::new();
        observers.log(Some(&ctx), "nothing listens", fields! { "a" => 1 });
        observers.api_call(&ctx, &Method::GET, "/v1/monitors", 200, Duration::ZERO);
        observers.retry(&ctx, &Method::GET, "/v1/monitors", 2);
        observers.breaker_transition(CircuitState::Closed, CircuitState::Open);
    }

    #[test]
    fn test_breaker_transition_reaches_logger_and_metrics() {
        let recorder = Arc::new(Recorder::default());
        let observers = Observers {
            logger: Some(recorder.clone()),
            metrics: Some(recorder.clone()),
        };

        observers.breaker_transition(CircuitState::Closed, CircuitState::Open);

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "circuit breaker state change");
        assert_eq!(events[0].1["from"], "closed");
        assert_eq!(events[0].1["to"], "open");
        assert_eq!(*recorder.states.lock().unwrap(), vec![CircuitState::Open]);
    }

    #[test]
    fn test_fields_macro() {
        let fields = fields! { "method" => "GET", "attempt" => 2u32 };
        assert_eq!(fields["method"], "GET");
        assert_eq!(fields["attempt"], 2);
    }
}
