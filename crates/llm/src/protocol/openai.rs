//! OpenAI-compatible Chat Completions wire types — the dialect every upstream speaks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /chat/completions` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model identifier, as resolved by the router.
    pub model: String,
    /// Conversation turns.
    pub messages: Vec<ChatMessage>,
    /// Tool definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    /// Tool-choice constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether to stream the response as SSE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stop sequences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the turn.
    pub role: ChatRole,
    /// Text content. `None` for assistant turns that are pure tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// For `role = tool`, the id of the `tool_calls` entry this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Out-of-band system prompt, inserted at the head of the message list.
    System,
    /// The human caller.
    User,
    /// The model.
    Assistant,
    /// A tool's result, addressed by `tool_call_id`.
    Tool,
}

/// A tool call requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique id for this invocation.
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The function invocation itself.
    pub function: FunctionCall,
}

/// A function invocation: name plus JSON-encoded arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// `JSON.stringify`-equivalent of the structured arguments.
    pub arguments: String,
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTool {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The function schema.
    pub function: FunctionSchema,
}

/// A function's name, description and JSON Schema parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// Function name.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the function's arguments.
    pub parameters: Value,
}

/// `POST /chat/completions` buffered response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Upstream-assigned completion id.
    #[serde(default)]
    pub id: String,
    /// Model that produced the response.
    #[serde(default)]
    pub model: String,
    /// One entry per requested completion; ccproxy always takes `choices[0]`.
    pub choices: Vec<Choice>,
    /// Token usage accounting.
    #[serde(default)]
    pub usage: Usage,
}

/// A single completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice (always 0 in practice, for ccproxy's purposes).
    #[serde(default)]
    pub index: u32,
    /// The generated message.
    pub message: ChatMessage,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Normal completion.
    Stop,
    /// Hit `max_tokens`.
    Length,
    /// The model called one or more tools.
    ToolCalls,
    /// Upstream content filter intervened.
    ContentFilter,
    /// Any other upstream-specific reason; maps to `end_turn` on translation.
    #[serde(other)]
    Other,
}

/// Token usage accounting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: u32,
}

/// A single `data: {json}` chunk of a streamed `POST /chat/completions` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Upstream-assigned completion id.
    #[serde(default)]
    pub id: String,
    /// Model that is producing the response.
    #[serde(default)]
    pub model: String,
    /// One entry per requested completion; ccproxy always takes `choices[0]`.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage, only present on some providers' final chunk.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A single choice's incremental delta within a streamed chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Index of this choice.
    #[serde(default)]
    pub index: u32,
    /// The incremental delta.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Set on the final chunk for this choice.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Incremental content of a streamed chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Incremental text fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental tool-call fragments, indexed by `ToolCallDelta::index`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// An incremental fragment of one tool call within a streamed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of this tool call among the assistant's tool calls in this chunk stream.
    pub index: u32,
    /// Present on the first fragment for this tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Incremental function fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

/// An incremental fragment of a function call's name/arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    /// Present on the first fragment for this tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Incremental JSON-arguments fragment; fragments must be concatenated in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
