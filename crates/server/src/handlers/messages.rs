//! `POST /v1/messages` — spec §6.1, the Messages endpoint: the Anthropic wire contract on both
//! sides, buffered JSON or `text/event-stream` depending on `"stream"`.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event as SseEvent, Sse},
        IntoResponse, Response,
    },
    Json,
};
use config::RateLimitKeyBy;
use events::{Event, EventType};
use futures_util::StreamExt;
use llm::{protocol::anthropic, ProxyError};

use crate::{auth, dispatch, error::ApiError, state::AppState};

/// Handle one `POST /v1/messages` call end to end (spec §4.10).
pub async fn messages(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle(state, addr, &headers, body).await {
        Ok(response) => response,
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn handle(
    state: Arc<AppState>,
    addr: SocketAddr,
    headers: &HeaderMap,
    body: Bytes,
) -> llm::Result<Response> {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    if !content_type.is_empty() && !content_type.starts_with("application/json") {
        return Err(ProxyError::InvalidRequest(format!(
            "unsupported content-type '{content_type}', expected application/json"
        )));
    }

    state.resource_monitor.check_request_size(body.len())?;

    let rate_limit_key = pre_route_rate_limit_key(&state, addr, headers);
    if let Some(key) = &rate_limit_key
        && !state.rate_limiter.allow(key)
    {
        publish_rate_limit_rejected(&state, key);
        return Err(ProxyError::RateLimitError { retry_after_secs: 1 });
    }

    let request: anthropic::Request =
        serde_json::from_slice(&body).map_err(|err| ProxyError::InvalidRequest(format!("malformed request body: {err}")))?;

    if request.messages.is_empty() {
        return Err(ProxyError::InvalidRequest("messages must not be empty".to_string()));
    }

    state.events.publish(Event::new(EventType::RequestReceived, "messages"));

    let streaming = request.stream.unwrap_or(false);
    let ctx = dispatch::prepare(&state, request)?;

    if let Some(RateLimitKeyBy::Provider) = provider_key_by(&state) {
        if !state.rate_limiter.allow(&ctx.decision.provider) {
            publish_rate_limit_rejected(&state, &ctx.decision.provider);
            return Err(ProxyError::RateLimitError { retry_after_secs: 1 });
        }
    }

    if streaming {
        let result = dispatch::dispatch_streaming(Arc::clone(&state), ctx).await;
        state.record_request(result.is_ok());
        let events = result?;

        let frames = events.map(|event| {
            let name = event.event_name();
            let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            Ok::<_, std::convert::Infallible>(SseEvent::default().event(name).data(data))
        });

        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        Ok((headers, Sse::new(frames)).into_response())
    } else {
        let result = dispatch::dispatch_buffered(&state, ctx).await;
        state.record_request(result.is_ok());
        Ok((StatusCode::OK, Json(result?)).into_response())
    }
}

fn provider_key_by(state: &AppState) -> Option<RateLimitKeyBy> {
    let config = state.config();
    config.performance.rate_limit.enabled.then_some(config.performance.rate_limit.key_by)
}

fn pre_route_rate_limit_key(state: &AppState, addr: SocketAddr, headers: &HeaderMap) -> Option<String> {
    let config = state.config();
    if !config.performance.rate_limit.enabled {
        return None;
    }

    match config.performance.rate_limit.key_by {
        RateLimitKeyBy::Ip => Some(addr.ip().to_string()),
        RateLimitKeyBy::ApiKey => auth::extract_presented_key(headers).or_else(|| Some(addr.ip().to_string())),
        // Provider-keyed limiting needs the resolved route, which only exists after `dispatch::prepare`.
        RateLimitKeyBy::Provider => None,
    }
}

fn publish_rate_limit_rejected(state: &AppState, key: &str) {
    state.events.publish(Event::new(EventType::RateLimitRejected, "rate_limiter").with_attribute("key", key));
}
