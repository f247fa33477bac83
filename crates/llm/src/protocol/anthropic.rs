//! Anthropic Messages API wire types — the protocol ccproxy speaks to its callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level Anthropic `POST /v1/messages` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Model identifier, or `"provider,model"` to bypass routing (see the router).
    pub model: String,
    /// Conversation turns.
    pub messages: Vec<Message>,
    /// Out-of-band system prompt, carried separately from `messages`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Tool definitions available to the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Tool-choice constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether the response should be streamed as SSE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Sequences that stop generation when produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Extended-thinking configuration; consumed by the router, then dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Thinking>,
}

/// Extended-thinking request flag and budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thinking {
    /// Thinking mode, typically `"enabled"` or `"disabled"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Token budget reserved for thinking content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

impl Request {
    /// Whether extended thinking is enabled on this request.
    pub fn thinking_enabled(&self) -> bool {
        self.thinking.as_ref().is_some_and(|t| t.kind == "enabled")
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author of the turn.
    pub role: Role,
    /// Either a plain string or an ordered list of content blocks.
    pub content: Content,
}

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human caller.
    User,
    /// The model.
    Assistant,
    /// A system turn (only produced internally; Anthropic carries system out-of-band).
    System,
}

/// Message content: either a bare string or a list of typed blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text shorthand.
    Text(String),
    /// Ordered content blocks.
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Concatenate all text-bearing parts of this content into a single string.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Iterate the content blocks, synthesizing a single `Text` block for the string shorthand.
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match self {
            Content::Text(text) => vec![ContentBlock::Text { text: text.clone() }],
            Content::Blocks(blocks) => blocks.clone(),
        }
    }
}

/// A typed content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text itself.
        text: String,
    },
    /// A tool invocation requested by the assistant.
    ToolUse {
        /// Unique id for this invocation, echoed back in the matching `tool_result`.
        id: String,
        /// Tool name.
        name: String,
        /// Structured arguments.
        input: Value,
    },
    /// The result of a previously requested tool invocation.
    ToolResult {
        /// The `tool_use.id` this result answers.
        tool_use_id: String,
        /// Result payload. Either a string or a list of blocks; always normalized to a string
        /// by [`Content::as_text`]-style flattening before being forwarded upstream.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
    },
    /// Extended-thinking content. Dropped on the outbound path once the router has consumed
    /// the `thinking` flag; see spec §9's open question on `thinking` mapping.
    Thinking {
        /// Thinking transcript.
        #[serde(default)]
        thinking: String,
        /// Opaque provider signature for the thinking block.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
}

/// Content of a `tool_result` block: either a bare string or a list of text parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Plain string result.
    Text(String),
    /// Multiple text parts, concatenated when forwarded upstream.
    Parts(Vec<ToolResultPart>),
}

impl ToolResultContent {
    /// Flatten to a single string, the shape OpenAI's `tool` message role expects.
    pub fn as_text(&self) -> String {
        match self {
            ToolResultContent::Text(text) => text.clone(),
            ToolResultContent::Parts(parts) => parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join(""),
        }
    }
}

/// A single text part within a multi-part tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultPart {
    /// Part kind, typically `"text"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// The text itself.
    #[serde(default)]
    pub text: String,
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

/// Tool-choice constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model may call any tool, or none.
    Auto,
    /// The model must call some tool.
    Any,
    /// The model must call the named tool.
    Tool {
        /// The tool to call.
        name: String,
    },
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model completed its turn normally.
    EndTurn,
    /// The model wants to call one or more tools.
    ToolUse,
    /// Generation stopped because `max_tokens` was reached.
    MaxTokens,
    /// Generation stopped on a configured stop sequence.
    StopSequence,
}

/// Top-level Anthropic `POST /v1/messages` buffered response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Synthetic message id, prefixed `msg_`.
    pub id: String,
    /// Always `"message"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Always `"assistant"`.
    pub role: Role,
    /// Ordered content blocks (text and tool_use interleaved).
    pub content: Vec<ContentBlock>,
    /// Model that produced the response (post-routing).
    pub model: String,
    /// Why generation stopped.
    pub stop_reason: Option<StopReason>,
    /// Token usage accounting.
    pub usage: Usage,
}

/// Token usage accounting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input (prompt) tokens, as reported by the upstream provider.
    pub input_tokens: u32,
    /// Output (completion) tokens, as reported by the upstream provider.
    pub output_tokens: u32,
}

/// Anthropic SSE event envelope, as written on the streaming path (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// First event of a stream: an empty message shell.
    MessageStart {
        /// The (mostly empty) message shell.
        message: MessageStart,
    },
    /// A new content block has begun at the given index.
    ContentBlockStart {
        /// Zero-based content block index.
        index: u32,
        /// The block's initial (empty) shape.
        content_block: ContentBlock,
    },
    /// An incremental update to the content block at the given index.
    ContentBlockDelta {
        /// Zero-based content block index.
        index: u32,
        /// The incremental delta.
        delta: ContentDelta,
    },
    /// The content block at the given index is now complete.
    ContentBlockStop {
        /// Zero-based content block index.
        index: u32,
    },
    /// Message-level incremental update, carrying the final stop reason and usage.
    MessageDelta {
        /// The delta payload.
        delta: MessageDeltaPayload,
        /// Cumulative usage known so far.
        usage: Usage,
    },
    /// Final event of a stream.
    MessageStop,
    /// An error occurred mid-stream.
    Error {
        /// Error details.
        error: ErrorDetails,
    },
}

impl StreamEvent {
    /// The SSE `event:` field name for this event, matching its `type` tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// The (mostly empty) message shell sent with `message_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStart {
    /// Synthetic message id.
    pub id: String,
    /// Always `"message"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Always `"assistant"`.
    pub role: Role,
    /// Always empty at `message_start`.
    pub content: Vec<ContentBlock>,
    /// Model that will produce the response.
    pub model: String,
    /// Always `None` at `message_start`.
    pub stop_reason: Option<StopReason>,
    /// Usage known so far (zeroed at `message_start`).
    pub usage: Usage,
}

/// Incremental content delta, keyed by the kind of block it targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    /// Incremental text for a `text` block.
    TextDelta {
        /// The text fragment.
        text: String,
    },
    /// Incremental JSON for a `tool_use` block's `input`.
    InputJsonDelta {
        /// The raw JSON fragment (not guaranteed to be valid JSON on its own).
        partial_json: String,
    },
}

/// The delta payload of a `message_delta` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeltaPayload {
    /// Final stop reason.
    pub stop_reason: Option<StopReason>,
}

/// Error body shape shared by HTTP error responses and mid-stream `error` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Closed error-type string (§7).
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

/// HTTP error body shape: `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorBody,
}

/// Error details as carried in an HTTP error body (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub message: String,
    /// Closed error-type string.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional fine-grained error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Request id, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
