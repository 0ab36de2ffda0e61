//! Integration tests using wiremock to simulate the API, plus an in-process
//! scripted transport for breaker, auth and TLS scenarios.

use futures::future::BoxFuture;
use http::Method;
use hyperping_client::{
    CircuitBreakerConfig, CircuitState, Client, ClientBuilder, Error, ErrorKind, Fields, Logger,
    Metrics, PoolConfig, RequestContext, RequestMetadata, Transport,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "sk_test_integration";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Monitor {
    uuid: String,
    name: String,
}

fn monitor(uuid: &str) -> Monitor {
    Monitor {
        uuid: uuid.to_string(),
        name: format!("monitor {}", uuid),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn builder(base_url: impl Into<String>) -> ClientBuilder {
    Client::builder(API_KEY)
        .base_url(base_url)
        .retry_wait(Duration::from_millis(10), Duration::from_millis(50))
        .user_agent_env(None)
}

#[derive(Clone)]
enum Step {
    Respond(u16, Vec<u8>),
    Stall,
}

fn respond(status: u16, body: &str) -> Step {
    Step::Respond(status, body.as_bytes().to_vec())
}

/// Plays back `steps` in order and then repeats the last one.
struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    authorization: Mutex<Option<String>>,
}

impl ScriptedTransport {
    fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
            authorization: Mutex::new(None),
        })
    }

    fn always(step: Step) -> Arc<Self> {
        Self::new([step])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        request: reqwest::Request,
    ) -> BoxFuture<'_, hyperping_client::Result<reqwest::Response>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.authorization.lock().unwrap() = request
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                steps.front().cloned().unwrap()
            }
        };

        Box::pin(async move {
            match step {
                Step::Respond(status, body) => {
                    let response = http::Response::builder()
                        .status(status)
                        .body(body)
                        .unwrap();
                    Ok(reqwest::Response::from(response))
                }
                Step::Stall => {
                    futures::future::pending::<hyperping_client::Result<reqwest::Response>>().await
                }
            }
        })
    }
}

#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<String>>,
    calls: Mutex<Vec<(Method, String, u16)>>,
    retries: Mutex<Vec<u32>>,
    states: Mutex<Vec<CircuitState>>,
}

impl Logger for Recorder {
    fn debug(&self, _ctx: Option<&RequestContext>, message: &str, _fields: &Fields) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

impl Metrics for Recorder {
    fn record_api_call(
        &self,
        _ctx: &RequestContext,
        method: &Method,
        path: &str,
        status: u16,
        _duration: Duration,
    ) {
        self.calls
            .lock()
            .unwrap()
            .push((method.clone(), path.to_string(), status));
    }

    fn record_retry(&self, _ctx: &RequestContext, _method: &Method, _path: &str, attempt: u32) {
        self.retries.lock().unwrap().push(attempt);
    }

    fn record_circuit_breaker_state(&self, state: CircuitState) {
        self.states.lock().unwrap().push(state);
    }
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/monitors/mon_1"))
        .and(header("authorization", "Bearer sk_test_integration"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(header_regex("user-agent", r"^hyperping-client/\S+ \(rust; [^)]+\)$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(monitor("mon_1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let ctx = RequestContext::new();

    let response = client
        .get::<Monitor>(&ctx, "/v1/monitors/mon_1")
        .await
        .unwrap();

    assert_eq!(response.data, monitor("mon_1"));
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
}

#[tokio::test]
async fn test_successful_post_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/monitors"))
        .and(body_json(serde_json::json!({"name": "checkout"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(monitor("mon_2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let ctx = RequestContext::new();

    let response = client
        .post::<_, Monitor>(&ctx, "/v1/monitors", &serde_json::json!({"name": "checkout"}))
        .await
        .unwrap();

    assert_eq!(response.data.uuid, "mon_2");
    assert_eq!(response.status.as_u16(), 201);
}

#[tokio::test]
async fn test_delete_with_empty_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/monitors/mon_1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let response = client
        .delete(&RequestContext::new(), "/v1/monitors/mon_1")
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 204);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/monitors/mon_gone"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"error": "Monitor not found"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let err = client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_gone")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.as_api_error().unwrap().message(), "Monitor not found");
}

#[tokio::test]
async fn test_validation_error_details() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/monitors"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "error": "validation_failed",
            "message": "Invalid monitor",
            "details": [
                {"field": "url", "message": "must be a valid URL"},
                {"field": "name", "message": "is required"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let err = client
        .post::<_, Monitor>(&RequestContext::new(), "/v1/monitors", &serde_json::json!({}))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    let api = err.as_api_error().unwrap();
    assert_eq!(api.message(), "Invalid monitor");
    assert_eq!(api.details().len(), 2);
    assert_eq!(api.details()[0].field, "url");
    assert!(err.to_string().ends_with("- 2 validation errors"));
}

#[tokio::test]
async fn test_deserialization_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/monitors/mon_1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let result = client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_1")
        .await;

    match result {
        Err(Error::DeserializationFailed {
            raw_response,
            serde_error,
            status,
        }) => {
            assert_eq!(status.as_u16(), 200);
            assert_eq!(raw_response, "invalid json");
            assert!(serde_error.contains("expected"));
        }
        _ => panic!("Expected DeserializationFailed, got {:?}", result),
    }
}

#[tokio::test]
async fn test_retry_on_5xx() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail, third succeeds
    Mock::given(method("GET"))
        .and(path("/v1/monitors/mon_1"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            match count {
                0 => ResponseTemplate::new(503).set_body_string("unavailable"),
                1 => ResponseTemplate::new(500).set_body_string("boom"),
                _ => ResponseTemplate::new(200).set_body_json(monitor("mon_1")),
            }
        })
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).max_retries(3).build().unwrap();
    let response = client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_1")
        .await
        .unwrap();

    assert_eq!(response.data.uuid, "mon_1");
    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/monitors"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).max_retries(2).build().unwrap();
    let err = client
        .get::<Vec<Monitor>>(&RequestContext::new(), "/v1/monitors")
        .await
        .unwrap_err();

    // max_retries: 2 means 3 total attempts (1 initial + 2 retries)
    assert!(err.is_server_error());
    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
}

#[tokio::test]
async fn test_retry_after_is_honored() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/v1/monitors/mon_1"))
        .respond_with(move |_req: &wiremock::Request| {
            if attempt_count_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(429).insert_header("Retry-After", "2")
            } else {
                ResponseTemplate::new(200).set_body_json(monitor("mon_1"))
            }
        })
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri())
        .retry_wait(Duration::from_millis(10), Duration::from_secs(30))
        .build()
        .unwrap();

    let start = Instant::now();
    let response = client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_1")
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(response.attempts, 2);
    assert_eq!(response.data.uuid, "mon_1");
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_after_is_capped_at_wait_max() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/monitors"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "600"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).max_retries(1).build().unwrap();

    let start = Instant::now();
    let err = client
        .get::<Vec<Monitor>>(&RequestContext::new(), "/v1/monitors")
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(err.is_rate_limited());
    assert_eq!(err.as_api_error().unwrap().retry_after(), Some(600));
    assert!(err.to_string().contains("retry after 600 seconds"));
}

#[tokio::test]
async fn test_list_normalizes_envelopes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/monitors"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "monitors": [monitor("mon_1"), monitor("mon_2")]
            })),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/outages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": [monitor("out_1")]})),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/healthchecks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![monitor("tok_1")]))
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let ctx = RequestContext::new();

    let monitors = client
        .list::<Monitor>(&ctx, "/v1/monitors", "monitors")
        .await
        .unwrap();
    assert_eq!(monitors.len(), 2);

    let outages = client
        .list::<Monitor>(&ctx, "/v2/outages", "outages")
        .await
        .unwrap();
    assert_eq!(outages[0].uuid, "out_1");

    let healthchecks = client
        .list::<Monitor>(&ctx, "/v1/healthchecks", "healthchecks")
        .await
        .unwrap();
    assert_eq!(healthchecks.data, vec![monitor("tok_1")]);
}

#[tokio::test]
async fn test_list_with_query_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/incidents"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"incidents": []})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let metadata = RequestMetadata::new(Method::GET, "/v1/incidents").with_query_param("page", "2");

    let incidents = client
        .list_with::<Monitor>(&RequestContext::new(), metadata, "incidents")
        .await
        .unwrap();
    assert!(incidents.is_empty());
}

#[tokio::test]
async fn test_list_malformed_body_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/monitors"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[{\"uuid\":"))
        .mount(&mock_server)
        .await;

    let client = builder(mock_server.uri()).build().unwrap();
    let err = client
        .list::<Monitor>(&RequestContext::new(), "/v1/monitors", "monitors")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn test_circuit_opens_and_fails_fast() {
    init_tracing();
    let transport = ScriptedTransport::always(respond(503, "unavailable"));
    let recorder = Arc::new(Recorder::default());
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .metrics(recorder.clone())
        .max_retries(0)
        .build()
        .unwrap();
    let ctx = RequestContext::new();

    for _ in 0..3 {
        let err = client
            .get::<Monitor>(&ctx, "/v1/monitors/mon_1")
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }
    assert_eq!(transport.calls(), 3);
    assert_eq!(client.circuit_state(), CircuitState::Open);

    let err = client
        .get::<Monitor>(&ctx, "/v1/monitors/mon_1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CircuitOpen));
    assert_eq!(err.kind(), ErrorKind::CircuitOpen);
    assert_eq!(transport.calls(), 3);
    assert_eq!(*recorder.states.lock().unwrap(), vec![CircuitState::Open]);
}

#[tokio::test]
async fn test_client_errors_do_not_trip_the_breaker() {
    let transport = ScriptedTransport::always(respond(404, r#"{"error":"not found"}"#));
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .build()
        .unwrap();
    let ctx = RequestContext::new();

    for _ in 0..5 {
        let err = client
            .get::<Monitor>(&ctx, "/v1/monitors/mon_1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
    assert_eq!(transport.calls(), 5);
    assert_eq!(client.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_breaker_opening_mid_retry_stops_the_call() {
    let transport = ScriptedTransport::always(respond(502, "bad gateway"));
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .max_retries(10)
        .circuit_breaker(CircuitBreakerConfig {
            min_requests: 2,
            ..CircuitBreakerConfig::default()
        })
        .build()
        .unwrap();

    let err = client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_1")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CircuitOpen));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_pre_cancelled_context_sends_nothing() {
    let transport = ScriptedTransport::always(respond(200, "{}"));
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .build()
        .unwrap();

    let ctx = RequestContext::new();
    ctx.cancel();

    let start = Instant::now();
    let err = client
        .get::<serde_json::Value>(&ctx, "/v1/monitors")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_backoff() {
    let transport = ScriptedTransport::always(respond(503, "unavailable"));
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .retry_wait(Duration::from_secs(10), Duration::from_secs(30))
        .build()
        .unwrap();

    let ctx = RequestContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let err = client
        .get::<serde_json::Value>(&ctx, "/v1/monitors")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_deadline_interrupts_stalled_request() {
    let transport = ScriptedTransport::always(Step::Stall);
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .build()
        .unwrap();

    let ctx = RequestContext::new().with_timeout(Duration::from_millis(100));
    let err = client
        .get::<serde_json::Value>(&ctx, "/v1/monitors")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DeadlineExceeded));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_attempt_timeout_is_retried() {
    let transport = ScriptedTransport::new([
        Step::Stall,
        respond(200, r#"{"uuid":"mon_1","name":"api"}"#),
    ]);
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let response = client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_1")
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_attempt_timeout_surfaces_as_transport_error() {
    let transport = ScriptedTransport::always(Step::Stall);
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .timeout(Duration::from_millis(20))
        .max_retries(1)
        .build()
        .unwrap();

    let err = client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_1")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_connection_refused_is_retried_then_returned() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let recorder = Arc::new(Recorder::default());
    let client = builder(format!("http://{}", addr))
        .metrics(recorder.clone())
        .max_retries(2)
        .build()
        .unwrap();

    let err = client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_1")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Network(_)), "unexpected error: {:?}", err);
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(*recorder.retries.lock().unwrap(), vec![1, 2]);
    assert!(recorder.calls.lock().unwrap().is_empty());
}

/// Accepts connections, answers with headers and then never sends the body.
async fn stalled_body_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                          content-length: 64\r\n\r\n{",
                    )
                    .await;
                futures::future::pending::<()>().await;
            });
        }
    });

    (format!("http://{}", addr), accepted)
}

#[tokio::test]
async fn test_connection_cap_covers_body_reads() {
    let (base_url, accepted) = stalled_body_server().await;
    let client = builder(base_url)
        .pool(PoolConfig {
            max_connections_per_host: 1,
            ..PoolConfig::default()
        })
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap();
    let ctx = RequestContext::new();

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                client
                    .get::<serde_json::Value>(&ctx, "/v1/monitors")
                    .await
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    ctx.cancel();
    for call in calls {
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}

#[tokio::test]
async fn test_invalid_resource_id_makes_no_request() {
    let transport = ScriptedTransport::always(respond(200, "{}"));
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .build()
        .unwrap();
    let ctx = RequestContext::new();

    let too_long = "a".repeat(200);
    for id in ["../../etc", "id?x=1", "", too_long.as_str()] {
        let result = async {
            let path = Client::resource_path("/v1/monitors", id)?;
            client.get::<serde_json::Value>(&ctx, path).await
        }
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::LocalValidation, "{:?}", id);
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_custom_transport_gets_auth_header() {
    let transport = ScriptedTransport::always(respond(200, "[]"));
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .build()
        .unwrap();

    client
        .list::<Monitor>(&RequestContext::new(), "/v1/monitors", "monitors")
        .await
        .unwrap();

    assert_eq!(
        transport.authorization.lock().unwrap().as_deref(),
        Some("Bearer sk_test_integration")
    );
}

#[tokio::test]
async fn test_custom_transport_cannot_bypass_tls() {
    let transport = ScriptedTransport::always(respond(200, "{}"));
    let client = builder("http://api.hyperping.test")
        .transport(transport.clone())
        .build()
        .unwrap();

    let err = client
        .get::<serde_json::Value>(&RequestContext::new(), "/v1/monitors")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsecureTransport { .. }));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let body = vec![b' '; hyperping_client::MAX_RESPONSE_BODY_SIZE + 1];
    let transport = ScriptedTransport::always(Step::Respond(200, body));
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .build()
        .unwrap();

    let err = client
        .get::<serde_json::Value>(&RequestContext::new(), "/v1/reports")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ResponseTooLarge { .. }));
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_logger_and_metrics_observe_the_call() {
    init_tracing();
    let transport = ScriptedTransport::new([
        respond(503, "unavailable"),
        respond(200, r#"{"uuid":"mon_1","name":"api"}"#),
    ]);
    let recorder = Arc::new(Recorder::default());
    let client = builder("https://api.hyperping.test")
        .transport(transport.clone())
        .logger(recorder.clone())
        .metrics(recorder.clone())
        .max_retries(1)
        .build()
        .unwrap();

    client
        .get::<Monitor>(&RequestContext::new(), "/v1/monitors/mon_1")
        .await
        .unwrap();

    let calls = recorder.calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![
            (Method::GET, "/v1/monitors/mon_1".to_string(), 503),
            (Method::GET, "/v1/monitors/mon_1".to_string(), 200),
        ]
    );
    assert_eq!(*recorder.retries.lock().unwrap(), vec![1]);

    let messages = recorder.messages.lock().unwrap();
    assert_eq!(
        *messages,
        vec![
            "sending API request",
            "received API response",
            "retrying API request",
            "sending API request",
            "received API response",
        ]
    );
}
