//! Anthropic → OpenAI request translation (spec §4.3).

use crate::protocol::{anthropic, openai};

/// Translate an Anthropic Messages request into an OpenAI Chat Completions request.
///
/// `model` is the already-routed model name (the router has already rewritten
/// `request.model`; this function does not touch routing). Anthropic-only fields consumed by
/// the router (`thinking`) and fields with no OpenAI equivalent (`cache_control`, carried on
/// individual content blocks in some Anthropic extensions) are dropped here, not earlier, so
/// the router still sees them.
pub fn anthropic_to_openai(request: anthropic::Request, model: String) -> openai::ChatCompletionRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = request.system {
        messages.push(openai::ChatMessage {
            role: openai::ChatRole::System,
            content: Some(system),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for message in request.messages {
        messages.extend(convert_message(message));
    }

    openai::ChatCompletionRequest {
        model,
        messages,
        tools: request.tools.map(|tools| tools.into_iter().map(convert_tool).collect()),
        tool_choice: request.tool_choice.map(convert_tool_choice),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream: request.stream,
        stop: request.stop_sequences,
    }
}

fn convert_message(message: anthropic::Message) -> Vec<openai::ChatMessage> {
    let role = message.role;
    let blocks = message.content.blocks();

    // A `user` message carrying a `tool_result` block becomes a `tool`-role message.
    if role == anthropic::Role::User {
        let tool_results: Vec<_> = blocks
            .iter()
            .filter_map(|b| match b {
                anthropic::ContentBlock::ToolResult { tool_use_id, content } => Some((tool_use_id.clone(), content)),
                _ => None,
            })
            .collect();

        if !tool_results.is_empty() {
            return tool_results
                .into_iter()
                .map(|(tool_use_id, content)| openai::ChatMessage {
                    role: openai::ChatRole::Tool,
                    content: Some(content.as_ref().map(anthropic::ToolResultContent::as_text).unwrap_or_default()),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id),
                })
                .collect();
        }
    }

    // An `assistant` message carrying `tool_use` blocks becomes an assistant message with
    // `tool_calls`, its text content (if any) concatenated separately.
    if role == anthropic::Role::Assistant {
        let tool_calls: Vec<_> = blocks
            .iter()
            .filter_map(|b| match b {
                anthropic::ContentBlock::ToolUse { id, name, input } => Some(openai::ToolCall {
                    id: id.clone(),
                    kind: "function".to_string(),
                    function: openai::FunctionCall {
                        name: name.clone(),
                        arguments: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string()),
                    },
                }),
                _ => None,
            })
            .collect();

        if !tool_calls.is_empty() {
            let text = concat_text(&blocks);
            return vec![openai::ChatMessage {
                role: openai::ChatRole::Assistant,
                content: if text.is_empty() { None } else { Some(text) },
                tool_calls: Some(tool_calls),
                tool_call_id: None,
            }];
        }
    }

    let text = concat_text(&blocks);

    vec![openai::ChatMessage {
        role: convert_role(role),
        content: Some(text),
        tool_calls: None,
        tool_call_id: None,
    }]
}

/// Concatenate the text-bearing parts of a block list. `thinking` blocks are intentionally
/// dropped here (spec §9): the router has already consumed the `thinking` flag.
fn concat_text(blocks: &[anthropic::ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            anthropic::ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

fn convert_role(role: anthropic::Role) -> openai::ChatRole {
    match role {
        anthropic::Role::User => openai::ChatRole::User,
        anthropic::Role::Assistant => openai::ChatRole::Assistant,
        anthropic::Role::System => openai::ChatRole::System,
    }
}

fn convert_tool(tool: anthropic::Tool) -> openai::ChatTool {
    openai::ChatTool {
        kind: "function".to_string(),
        function: openai::FunctionSchema {
            name: tool.name,
            description: Some(tool.description),
            parameters: tool.input_schema,
        },
    }
}

fn convert_tool_choice(choice: anthropic::ToolChoice) -> serde_json::Value {
    match choice {
        anthropic::ToolChoice::Auto => serde_json::json!("auto"),
        anthropic::ToolChoice::Any => serde_json::json!("auto"),
        anthropic::ToolChoice::Tool { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}
