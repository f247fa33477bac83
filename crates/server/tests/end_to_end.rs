//! Hand-rolled mock-upstream end-to-end tests (spec §8's seeded scenarios): a second in-process
//! axum server stands in for the upstream provider, and the real router is driven with
//! `tower::ServiceExt::oneshot` rather than a bound socket.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use config::{Config, ProviderConfig, RouteConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const CALLER_ADDR: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 51234);

#[derive(Clone)]
enum Behavior {
    Buffered(Value),
    Sse(Vec<String>),
    Error(u16),
}

#[derive(Clone)]
struct MockState {
    calls: Arc<AtomicUsize>,
    behavior: Behavior,
}

async fn mock_handler(State(state): State<MockState>) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    match &state.behavior {
        Behavior::Buffered(body) => (StatusCode::OK, Json(body.clone())).into_response(),
        Behavior::Sse(payloads) => {
            let mut body = String::new();
            for payload in payloads {
                body.push_str(&format!("data: {payload}\n\n"));
            }
            body.push_str("data: [DONE]\n\n");
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Behavior::Error(status) => (StatusCode::from_u16(*status).unwrap(), "mock upstream error").into_response(),
    }
}

/// Spin up a throwaway mock upstream on a random loopback port. Torn down when the caller drops
/// the returned [`tokio::task::JoinHandle`] (or the process exits).
async fn spawn_mock_upstream(behavior: Behavior) -> (String, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let state = MockState { calls: calls.clone(), behavior };
    let app = Router::new().route("/chat/completions", post(mock_handler)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{addr}"), calls, handle)
}

fn base_config(upstream_base_url: &str) -> Config {
    let mut config = Config::default();
    config.providers.insert(
        "mock".to_string(),
        ProviderConfig {
            api_base_url: upstream_base_url.to_string(),
            api_key: "sk-mock".to_string().into(),
            models: vec!["mock-model".to_string()],
            enabled: true,
            transformers: Default::default(),
        },
    );
    config.routes.insert(
        "default".to_string(),
        RouteConfig {
            provider: "mock".to_string(),
            model: "mock-model".to_string(),
        },
    );
    config.performance.circuit_breaker.enabled = false;
    config
}

fn json_request(body: Value) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(CALLER_ADDR));
    request
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Scenario 1 (spec §8): a buffered text reply round-trips to the Anthropic response shape.
#[tokio::test]
async fn buffered_text_reply_translates_to_anthropic_shape() {
    let (base_url, calls, _upstream) = spawn_mock_upstream(Behavior::Buffered(json!({
        "id": "cmpl-x",
        "choices": [{"message": {"role": "assistant", "content": "Hi"}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 1, "completion_tokens": 1},
    })))
    .await;

    let state = Arc::new(server::AppState::new(base_config(&base_url)).unwrap());
    let app = server::router(state);

    let request = json_request(json!({
        "model": "mock-model",
        "messages": [{"role": "user", "content": "Hello"}],
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["id"].as_str().unwrap().starts_with("msg_"));
    assert_eq!(body["type"], "message");
    assert_eq!(body["role"], "assistant");
    assert_eq!(body["content"], json!([{"type": "text", "text": "Hi"}]));
    assert_eq!(body["model"], "mock-model");
    assert_eq!(body["stop_reason"], "end_turn");
    assert_eq!(body["usage"], json!({"input_tokens": 1, "output_tokens": 1}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Scenario 2 (spec §8): a streamed reply produces the expected named SSE event sequence.
#[tokio::test]
async fn streaming_reply_emits_expected_sse_event_sequence() {
    let (base_url, _calls, _upstream) = spawn_mock_upstream(Behavior::Sse(vec![
        json!({"choices": [{"index": 0, "delta": {"content": "Hel"}}]}).to_string(),
        json!({"choices": [{"index": 0, "delta": {"content": "lo"}}]}).to_string(),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}).to_string(),
    ]))
    .await;

    let state = Arc::new(server::AppState::new(base_config(&base_url)).unwrap());
    let app = server::router(state);

    let request = json_request(json!({
        "model": "mock-model",
        "messages": [{"role": "user", "content": "Hello"}],
        "stream": true,
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let events: Vec<&str> = text.lines().filter_map(|line| line.strip_prefix("event: ")).collect();
    assert_eq!(
        events,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );
    assert!(text.contains("\"text\":\"Hel\""));
    assert!(text.contains("\"text\":\"lo\""));
    assert!(text.contains("\"stop_reason\":\"end_turn\""));
}

/// Scenario 3 (spec §8): an explicit but unknown provider fails before any upstream call is made.
#[tokio::test]
async fn unknown_explicit_provider_fails_without_calling_upstream() {
    let (base_url, calls, _upstream) = spawn_mock_upstream(Behavior::Buffered(json!({}))).await;

    let state = Arc::new(server::AppState::new(base_config(&base_url)).unwrap());
    let app = server::router(state);

    let request = json_request(json!({
        "model": "unknown,model",
        "messages": [{"role": "user", "content": "Hello"}],
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "provider_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("provider not found"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Scenario 4 (spec §8): a tool-calling upstream reply translates to a `tool_use` block.
#[tokio::test]
async fn tool_call_reply_translates_to_tool_use_block() {
    let (base_url, _calls, _upstream) = spawn_mock_upstream(Behavior::Buffered(json!({
        "id": "cmpl-x",
        "choices": [{
            "message": {
                "role": "assistant",
                "tool_calls": [{"id": "c1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":\"SF\"}"}}],
            },
            "finish_reason": "tool_calls",
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 5},
    })))
    .await;

    let state = Arc::new(server::AppState::new(base_config(&base_url)).unwrap());
    let app = server::router(state);

    let request = json_request(json!({
        "model": "mock-model",
        "messages": [{"role": "user", "content": "What's the weather in SF?"}],
        "tools": [{"name": "get_weather", "description": "Look up the weather", "input_schema": {"type": "object", "properties": {}}}],
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["content"],
        json!([{"type": "tool_use", "id": "c1", "name": "get_weather", "input": {"city": "SF"}}])
    );
    assert_eq!(body["stop_reason"], "tool_use");
}

/// Scenario 5 (spec §8): a wrong bearer token against a configured key is rejected before dispatch.
#[tokio::test]
async fn wrong_bearer_token_is_rejected_without_calling_upstream() {
    let (base_url, calls, _upstream) = spawn_mock_upstream(Behavior::Buffered(json!({}))).await;

    let mut config = base_config(&base_url);
    config.api_key = Some("right-key".to_string().into());
    let state = Arc::new(server::AppState::new(config).unwrap());
    let app = server::router(state);

    let mut request = json_request(json!({
        "model": "mock-model",
        "messages": [{"role": "user", "content": "Hello"}],
    }));
    request.headers_mut().insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "authentication_error");
    assert_eq!(body["error"]["code"], "invalid_api_key");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Scenario 6 (spec §8): two upstream failures trip the breaker; a third request within
/// `open_duration` is rejected without reaching the upstream at all.
#[tokio::test]
async fn circuit_breaker_opens_after_consecutive_failures() {
    let (base_url, calls, _upstream) = spawn_mock_upstream(Behavior::Error(500)).await;

    let mut config = base_config(&base_url);
    config.performance.circuit_breaker.enabled = true;
    config.performance.circuit_breaker.consecutive_failures = 2;
    config.performance.circuit_breaker.open_duration_secs = 30;
    let state = Arc::new(server::AppState::new(config).unwrap());
    let app = server::router(state);

    let make_request = || {
        json_request(json!({
            "model": "mock-model",
            "messages": [{"role": "user", "content": "Hello"}],
        }))
    };

    // The mock upstream answers with a bare 500, which `provider_error` echoes verbatim.
    let first = app.clone().oneshot(make_request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let first_body = body_json(first).await;
    assert_eq!(first_body["error"]["type"], "provider_error");

    let second = app.clone().oneshot(make_request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let third = app.clone().oneshot(make_request()).await.unwrap();
    assert_eq!(third.status(), StatusCode::SERVICE_UNAVAILABLE);
    let third_body = body_json(third).await;
    assert_eq!(third_body["error"]["type"], "circuit_open");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
