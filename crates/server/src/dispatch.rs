//! Per-request dispatch orchestration (spec §4.10): the steps between a decoded Anthropic
//! request and a client-facing response, shared by both the buffered and streaming paths.

use std::{collections::VecDeque, sync::Arc, time::Instant};

use config::ProviderConfig;
use events::{Event, EventType};
use futures_util::{Stream, StreamExt};
use llm::{protocol::anthropic, router::RouteDecision, transform::stream::StreamTranslator, ProxyError};
use secrecy::ExposeSecret;

use crate::state::AppState;

/// A request successfully routed, circuit-checked and ready to dispatch upstream.
pub struct DispatchContext {
    pub decision: RouteDecision,
    pub provider: ProviderConfig,
    pub openai_request: llm::protocol::openai::ChatCompletionRequest,
}

/// Route, circuit-check and translate an inbound Anthropic request. Does not perform HTTP I/O.
pub fn prepare(state: &AppState, request: anthropic::Request) -> llm::Result<DispatchContext> {
    state.resource_monitor.check_limits()?;

    let config = state.config();
    let decision = llm::route(&config, &request)?;

    let provider = state
        .registry
        .provider_config(&decision.provider)
        .ok_or_else(|| ProxyError::ProviderNotFound(format!("provider not found: '{}'", decision.provider)))?;

    if !state.registry.is_healthy(&decision.provider) {
        log::warn!("dispatching to '{}' despite unhealthy status: no alternative configured", decision.provider);
    }

    if let Some(breaker) = state.breaker(&decision.provider)
        && !breaker.allow()
    {
        return Err(ProxyError::CircuitOpen(decision.provider.clone()));
    }

    let model = decision.model.clone();
    let openai_request = llm::transform::request::anthropic_to_openai(request, model);

    Ok(DispatchContext {
        decision,
        provider,
        openai_request,
    })
}

/// Dispatch a buffered (non-streaming) request and translate the response back.
pub async fn dispatch_buffered(state: &AppState, ctx: DispatchContext) -> llm::Result<anthropic::Response> {
    let DispatchContext {
        decision,
        provider,
        openai_request,
    } = ctx;

    let _task = state.resource_monitor.task_started();
    let start = Instant::now();

    let url = format!("{}/chat/completions", provider.api_base_url.trim_end_matches('/'));
    let request_payload = serde_json::to_value(&openai_request).unwrap_or_else(|_| serde_json::json!({}));
    let request_payload = llm::transform::hooks::apply_request(provider.transformers.request.as_deref(), request_payload);

    let result = state.http.post(&url).bearer_auth(provider.api_key.expose_secret()).json(&request_payload).send().await;

    let outcome = match result {
        Ok(response) if response.status().is_success() => {
            let bytes = response.bytes().await.map_err(|err| ProxyError::ProviderError {
                status: None,
                message: format!("failed to read upstream response: {err}"),
            })?;
            state.resource_monitor.check_response_size(bytes.len())?;

            let raw: serde_json::Value = serde_json::from_slice(&bytes).map_err(|err| ProxyError::ProviderError {
                status: None,
                message: format!("malformed upstream response: {err}"),
            })?;
            let raw = llm::transform::hooks::apply_response(provider.transformers.response.as_deref(), raw);
            let body: llm::protocol::openai::ChatCompletionResponse =
                serde_json::from_value(raw).map_err(|err| ProxyError::ProviderError {
                    status: None,
                    message: format!("malformed upstream response: {err}"),
                })?;

            let response = llm::transform::response::openai_to_anthropic(body, decision.model.clone());
            publish_tool_args_parse_failures(state, &decision.provider, &response);
            Ok(response)
        }
        Ok(response) => {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(ProxyError::ProviderError {
                status: Some(status),
                message,
            })
        }
        Err(err) if err.is_timeout() => Err(ProxyError::UpstreamTimeout),
        Err(err) => Err(ProxyError::ProviderError {
            status: None,
            message: err.to_string(),
        }),
    };

    record_outcome(state, &decision.provider, start, outcome.is_ok());
    outcome
}

/// Dispatch a streaming request, returning a translated Anthropic SSE event stream.
pub async fn dispatch_streaming(
    state: Arc<AppState>,
    ctx: DispatchContext,
) -> llm::Result<impl futures_util::Stream<Item = anthropic::StreamEvent>> {
    let DispatchContext {
        decision,
        provider,
        openai_request,
    } = ctx;

    let url = format!("{}/chat/completions", provider.api_base_url.trim_end_matches('/'));
    let start = Instant::now();

    let request_payload = serde_json::to_value(&openai_request).unwrap_or_else(|_| serde_json::json!({}));
    let request_payload = llm::transform::hooks::apply_request(provider.transformers.request.as_deref(), request_payload);

    let response = state
        .http
        .post(&url)
        .bearer_auth(provider.api_key.expose_secret())
        .json(&request_payload)
        .send()
        .await
        .map_err(|err| {
            record_outcome(&state, &decision.provider, start, false);
            if err.is_timeout() {
                ProxyError::UpstreamTimeout
            } else {
                ProxyError::ProviderError {
                    status: None,
                    message: err.to_string(),
                }
            }
        })?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        record_outcome(&state, &decision.provider, start, false);
        return Err(ProxyError::ProviderError {
            status: Some(status),
            message,
        });
    }

    let model = decision.model.clone();
    let provider_name = decision.provider.clone();
    let response_transformer = provider.transformers.response.clone();
    let source = eventsource_stream::Eventsource::eventsource(response.bytes_stream());

    let translator = StreamTranslator::new(model);
    let seed = StreamState {
        source: Box::pin(source),
        translator,
        pending: VecDeque::new(),
        done: false,
        state,
        provider_name,
        response_transformer,
        start,
    };

    Ok(futures_util::stream::unfold(seed, drive_stream))
}

/// Threaded through [`futures_util::stream::unfold`] while driving a single streaming response.
struct StreamState {
    source: std::pin::Pin<Box<dyn Stream<Item = Result<eventsource_stream::Event, eventsource_stream::EventStreamError<reqwest::Error>>> + Send>>,
    translator: StreamTranslator,
    pending: VecDeque<anthropic::StreamEvent>,
    done: bool,
    state: Arc<AppState>,
    provider_name: String,
    response_transformer: Option<String>,
    start: Instant,
}

async fn drive_stream(mut state: StreamState) -> Option<(anthropic::StreamEvent, StreamState)> {
    loop {
        if let Some(event) = state.pending.pop_front() {
            return Some((event, state));
        }

        if state.done {
            return None;
        }

        match state.source.next().await {
            Some(Ok(event)) if event.data == "[DONE]" => {
                state.pending.extend(state.translator.on_upstream_end());
                state.done = true;
                record_outcome(&state.state, &state.provider_name, state.start, true);
            }
            Some(Ok(event)) => {
                let parsed = serde_json::from_str::<serde_json::Value>(&event.data).map(|raw| {
                    llm::transform::hooks::apply_response(state.response_transformer.as_deref(), raw)
                });
                match parsed.and_then(serde_json::from_value::<llm::protocol::openai::ChatCompletionChunk>) {
                    Ok(chunk) => state.pending.extend(state.translator.on_chunk(&chunk)),
                    Err(err) => log::warn!(
                        "failed to parse upstream stream chunk from '{}': {err}",
                        state.provider_name
                    ),
                }
                if state.translator.is_closed() {
                    state.done = true;
                    record_outcome(&state.state, &state.provider_name, state.start, true);
                }
            }
            Some(Err(err)) => {
                log::warn!("upstream SSE error from '{}': {err}", state.provider_name);
                state.pending.extend(state.translator.on_upstream_error());
                state.done = true;
                record_outcome(&state.state, &state.provider_name, state.start, false);
            }
            None => {
                if !state.translator.is_closed() {
                    state.pending.extend(state.translator.on_upstream_end());
                }
                state.done = true;
                record_outcome(&state.state, &state.provider_name, state.start, true);
            }
        }
    }
}

/// A tool call whose `function.arguments` didn't parse as JSON is wrapped as `{"raw": ...}` by
/// the pure translation step (spec §9); here, where the event bus actually lives, that's
/// surfaced as a [`EventType::ToolArgsParseFailed`] event rather than silently swallowed.
fn publish_tool_args_parse_failures(state: &AppState, provider: &str, response: &anthropic::Response) {
    for block in &response.content {
        if let anthropic::ContentBlock::ToolUse { name, input, .. } = block
            && let Some(object) = input.as_object()
            && object.len() == 1
            && object.contains_key("raw")
        {
            state.events.publish(
                Event::new(EventType::ToolArgsParseFailed, "dispatch")
                    .with_attribute("provider", provider)
                    .with_attribute("tool", name.as_str()),
            );
        }
    }
}

fn record_outcome(state: &AppState, provider: &str, start: Instant, success: bool) {
    let latency = start.elapsed();
    state.registry.record_outcome(provider, success, latency);
    state.histogram.record(latency.as_millis() as u64);
    if let Some(breaker) = state.breaker(provider) {
        breaker.record_outcome(success);
    }

    state.events.publish(
        Event::new(EventType::RequestCompleted, "dispatch")
            .with_attribute("provider", provider)
            .with_attribute("success", success.to_string()),
    );
}
