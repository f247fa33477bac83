//! OpenAI → Anthropic buffered response translation (spec §4.3).

use uuid::Uuid;

use crate::protocol::{anthropic, openai};

/// Translate a buffered OpenAI Chat Completions response into an Anthropic Messages response.
///
/// Always takes `choices[0]`; callers are expected to reject upstream responses with zero
/// choices before calling this (an upstream that returns no choices is a provider protocol
/// violation, not something this pure translation step should paper over).
pub fn openai_to_anthropic(response: openai::ChatCompletionResponse, model: String) -> anthropic::Response {
    let choice = response.choices.into_iter().next();
    let message = choice.as_ref().map(|c| &c.message);

    let mut content = Vec::new();

    if let Some(text) = message.and_then(|m| m.content.clone()) {
        if !text.is_empty() {
            content.push(anthropic::ContentBlock::Text { text });
        }
    }

    let mut any_parse_failure = false;

    if let Some(tool_calls) = message.and_then(|m| m.tool_calls.clone()) {
        for call in tool_calls {
            let input = match serde_json::from_str::<serde_json::Value>(&call.function.arguments) {
                Ok(value) => value,
                Err(_) => {
                    any_parse_failure = true;
                    serde_json::json!({ "raw": call.function.arguments })
                }
            };

            content.push(anthropic::ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }
    }

    if any_parse_failure {
        log::warn!("upstream emitted unparsable tool_calls.function.arguments; wrapped as {{raw: ...}}");
    }

    let stop_reason = choice.as_ref().and_then(|c| c.finish_reason).map(map_finish_reason);

    anthropic::Response {
        id: format!("msg_{}", short_id()),
        kind: "message".to_string(),
        role: anthropic::Role::Assistant,
        content,
        model,
        stop_reason,
        usage: anthropic::Usage {
            input_tokens: response.usage.prompt_tokens,
            output_tokens: response.usage.completion_tokens,
        },
    }
}

/// `finish_reason` → `stop_reason` mapping (spec §4.3): anything unrecognized maps to `end_turn`.
pub fn map_finish_reason(reason: openai::FinishReason) -> anthropic::StopReason {
    match reason {
        openai::FinishReason::Stop => anthropic::StopReason::EndTurn,
        openai::FinishReason::Length => anthropic::StopReason::MaxTokens,
        openai::FinishReason::ToolCalls => anthropic::StopReason::ToolUse,
        openai::FinishReason::ContentFilter => anthropic::StopReason::StopSequence,
        openai::FinishReason::Other => anthropic::StopReason::EndTurn,
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..24].to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_response_maps_stop_to_end_turn() {
        let resp = openai::ChatCompletionResponse {
            id: "cmpl-x".to_string(),
            model: "gpt-4o".to_string(),
            choices: vec![openai::Choice {
                index: 0,
                message: openai::ChatMessage {
                    role: openai::ChatRole::Assistant,
                    content: Some("Hi".to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                finish_reason: Some(openai::FinishReason::Stop),
            }],
            usage: openai::Usage {
                prompt_tokens: 1,
                completion_tokens: 1,
            },
        };

        let out = openai_to_anthropic(resp, "mock-model".to_string());
        assert!(out.id.starts_with("msg_"));
        assert_eq!(out.stop_reason, Some(anthropic::StopReason::EndTurn));
        assert_eq!(out.usage.input_tokens, 1);
        assert_eq!(out.usage.output_tokens, 1);
        assert_eq!(out.content.len(), 1);
        assert!(matches!(&out.content[0], anthropic::ContentBlock::Text { text } if text == "Hi"));
    }

    #[test]
    fn tool_calls_map_to_tool_use_with_parsed_input() {
        let resp = openai::ChatCompletionResponse {
            id: "cmpl-x".to_string(),
            model: "gpt-4o".to_string(),
            choices: vec![openai::Choice {
                index: 0,
                message: openai::ChatMessage {
                    role: openai::ChatRole::Assistant,
                    content: None,
                    tool_calls: Some(vec![openai::ToolCall {
                        id: "c1".to_string(),
                        kind: "function".to_string(),
                        function: openai::FunctionCall {
                            name: "get_weather".to_string(),
                            arguments: r#"{"city":"SF"}"#.to_string(),
                        },
                    }]),
                    tool_call_id: None,
                },
                finish_reason: Some(openai::FinishReason::ToolCalls),
            }],
            usage: openai::Usage::default(),
        };

        let out = openai_to_anthropic(resp, "mock-model".to_string());
        assert_eq!(out.stop_reason, Some(anthropic::StopReason::ToolUse));
        match &out.content[0] {
            anthropic::ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "c1");
                assert_eq!(name, "get_weather");
                assert_eq!(input, &json!({"city": "SF"}));
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn unparsable_arguments_wrap_as_raw() {
        let resp = openai::ChatCompletionResponse {
            id: "cmpl-x".to_string(),
            model: "gpt-4o".to_string(),
            choices: vec![openai::Choice {
                index: 0,
                message: openai::ChatMessage {
                    role: openai::ChatRole::Assistant,
                    content: None,
                    tool_calls: Some(vec![openai::ToolCall {
                        id: "c1".to_string(),
                        kind: "function".to_string(),
                        function: openai::FunctionCall {
                            name: "get_weather".to_string(),
                            arguments: "not json".to_string(),
                        },
                    }]),
                    tool_call_id: None,
                },
                finish_reason: Some(openai::FinishReason::ToolCalls),
            }],
            usage: openai::Usage::default(),
        };

        let out = openai_to_anthropic(resp, "mock-model".to_string());
        match &out.content[0] {
            anthropic::ContentBlock::ToolUse { input, .. } => {
                assert_eq!(input, &json!({"raw": "not json"}));
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_finish_reason_maps_to_end_turn() {
        assert_eq!(map_finish_reason(openai::FinishReason::ContentFilter), anthropic::StopReason::StopSequence);
    }
}
