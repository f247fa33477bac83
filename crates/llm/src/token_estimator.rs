//! Deterministic, model-agnostic token approximator (spec §4.1).
//!
//! Used only for routing decisions — never reported to clients as `usage`. The function is
//! pure: equal inputs produce equal outputs across runs and across processes. Any refinement
//! must bump [`TOKEN_ESTIMATOR_VERSION`] so pinned test fixtures keep their meaning.

use crate::protocol::anthropic::{Content, ContentBlock, Request, ToolResultContent};

/// Version of the estimation algorithm. Bump this, don't silently change the math.
pub const TOKEN_ESTIMATOR_VERSION: u32 = 1;

/// Estimate the total input token count of a request: messages, system prompt and tool schemas.
pub fn estimate_tokens(request: &Request) -> u64 {
    let mut total = 0u64;

    if let Some(system) = &request.system {
        total += chars_to_tokens(system.len());
    }

    for message in &request.messages {
        total += estimate_content_tokens(&message.content);
    }

    if let Some(tools) = &request.tools {
        for tool in tools {
            let schema_len = serde_json::to_string(&tool.input_schema).map(|s| s.len()).unwrap_or(0);
            let len = tool.name.len() + tool.description.len() + schema_len;
            total += chars_to_tokens(len);
        }
    }

    total
}

fn estimate_content_tokens(content: &Content) -> u64 {
    content.blocks().iter().map(estimate_block_tokens).sum()
}

fn estimate_block_tokens(block: &ContentBlock) -> u64 {
    match block {
        ContentBlock::Text { text } => chars_to_tokens(text.len()),
        ContentBlock::ToolUse { input, .. } => {
            let len = serde_json::to_string(input).map(|s| s.len()).unwrap_or(0);
            chars_to_tokens(len)
        }
        ContentBlock::ToolResult { content, .. } => {
            let len = content.as_ref().map(ToolResultContent::as_text).map(|s| s.len()).unwrap_or(0);
            chars_to_tokens(len)
        }
        ContentBlock::Thinking { thinking, .. } => chars_to_tokens(thinking.len()),
    }
}

/// `ceil(len / 4)`, the fixed character-to-token ratio spec §4.1 mandates.
fn chars_to_tokens(len: usize) -> u64 {
    len.div_ceil(4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::anthropic::{Message, Role};

    fn request_with_text(text: &str) -> Request {
        Request {
            model: "m".into(),
            messages: vec![Message {
                role: Role::User,
                content: Content::Text(text.to_string()),
            }],
            system: None,
            tools: None,
            tool_choice: None,
            max_tokens: Some(100),
            temperature: None,
            stream: None,
            stop_sequences: None,
            thinking: None,
        }
    }

    #[test]
    fn pure_function_equal_inputs_equal_outputs() {
        let req = request_with_text("hello world, this is a test message");
        assert_eq!(estimate_tokens(&req), estimate_tokens(&req));
    }

    #[test]
    fn four_chars_per_token_ceiling() {
        let req = request_with_text("abcde"); // 5 chars -> ceil(5/4) = 2
        assert_eq!(estimate_tokens(&req), 2);
    }

    #[test]
    fn system_prompt_counts_as_text() {
        let mut req = request_with_text("");
        req.system = Some("a".repeat(100));
        assert_eq!(estimate_tokens(&req), 25);
    }

    #[test]
    fn empty_text_is_zero_tokens() {
        let req = request_with_text("");
        assert_eq!(estimate_tokens(&req), 0);
    }
}
