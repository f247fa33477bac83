//! Streaming engine (spec §4.4): converts an upstream OpenAI-shape SSE stream into Anthropic's
//! finer-grained SSE event stream.
//!
//! One [`StreamTranslator`] is owned by a single task driving a single response; per spec §5
//! ("a single serialized writer") nothing here is `Sync`-shared across tasks. The translator
//! never emits a `content_block_delta` for an index that hasn't had a `content_block_start`,
//! and never a second `content_block_start`/`content_block_delta` for an index already stopped.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    protocol::{anthropic, openai},
    transform::response::map_finish_reason,
};

/// Per-stream state machine driving the Anthropic event sequence.
pub struct StreamTranslator {
    message_id: String,
    model: String,
    stage: Stage,
    next_index: u32,
    open_blocks: Vec<u32>,
    text_block_index: Option<u32>,
    tool_block_index_by_upstream: HashMap<u32, u32>,
    output_chars: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Open,
    Closed,
}

impl StreamTranslator {
    /// Create a translator for a new response to the given (already-routed) model.
    pub fn new(model: String) -> Self {
        Self {
            message_id: format!("msg_{}", short_id()),
            model,
            stage: Stage::Idle,
            next_index: 0,
            open_blocks: Vec::new(),
            text_block_index: None,
            tool_block_index_by_upstream: HashMap::new(),
            output_chars: 0,
        }
    }

    /// Whether the stream has reached its terminal state; no further events should be fed in.
    pub fn is_closed(&self) -> bool {
        self.stage == Stage::Closed
    }

    fn ensure_started(&mut self, events: &mut Vec<anthropic::StreamEvent>) {
        if self.stage == Stage::Idle {
            events.push(anthropic::StreamEvent::MessageStart {
                message: anthropic::MessageStart {
                    id: self.message_id.clone(),
                    kind: "message".to_string(),
                    role: anthropic::Role::Assistant,
                    content: Vec::new(),
                    model: self.model.clone(),
                    stop_reason: None,
                    usage: anthropic::Usage::default(),
                },
            });
            self.stage = Stage::Open;
        }
    }

    /// Feed a single upstream chunk, returning the Anthropic events it produces.
    pub fn on_chunk(&mut self, chunk: &openai::ChatCompletionChunk) -> Vec<anthropic::StreamEvent> {
        let mut events = Vec::new();
        self.ensure_started(&mut events);

        let Some(choice) = chunk.choices.first() else {
            return events;
        };

        if let Some(text) = choice.delta.content.as_deref().filter(|t| !t.is_empty()) {
            self.open_text_block(&mut events);
            self.output_chars += text.len() as u64;
            events.push(anthropic::StreamEvent::ContentBlockDelta {
                index: self.text_block_index.expect("just opened"),
                delta: anthropic::ContentDelta::TextDelta { text: text.to_string() },
            });
        }

        if let Some(tool_calls) = &choice.delta.tool_calls {
            for fragment in tool_calls {
                self.apply_tool_call_fragment(fragment, &mut events);
            }
        }

        if let Some(finish_reason) = choice.finish_reason {
            self.close_all_blocks(&mut events);

            let output_tokens = chunk
                .usage
                .as_ref()
                .map(|u| u.completion_tokens)
                .unwrap_or_else(|| self.output_chars.div_ceil(4) as u32);

            events.push(anthropic::StreamEvent::MessageDelta {
                delta: anthropic::MessageDeltaPayload {
                    stop_reason: Some(map_finish_reason(finish_reason)),
                },
                usage: anthropic::Usage {
                    input_tokens: 0,
                    output_tokens,
                },
            });
            events.push(anthropic::StreamEvent::MessageStop);
            self.stage = Stage::Closed;
        }

        events
    }

    /// Upstream terminated (`data: [DONE]` or connection close) without a `finish_reason`;
    /// treated the same as `finish_reason: stop` (spec §4.4).
    pub fn on_upstream_end(&mut self) -> Vec<anthropic::StreamEvent> {
        if self.stage == Stage::Closed {
            return Vec::new();
        }

        let mut events = Vec::new();
        self.ensure_started(&mut events);
        self.close_all_blocks(&mut events);

        events.push(anthropic::StreamEvent::MessageDelta {
            delta: anthropic::MessageDeltaPayload {
                stop_reason: Some(anthropic::StopReason::EndTurn),
            },
            usage: anthropic::Usage {
                input_tokens: 0,
                output_tokens: self.output_chars.div_ceil(4) as u32,
            },
        });
        events.push(anthropic::StreamEvent::MessageStop);
        self.stage = Stage::Closed;

        events
    }

    /// Upstream errored mid-stream; close whatever is open and terminate with `end_turn`.
    pub fn on_upstream_error(&mut self) -> Vec<anthropic::StreamEvent> {
        self.on_upstream_end()
    }

    fn open_text_block(&mut self, events: &mut Vec<anthropic::StreamEvent>) {
        if self.text_block_index.is_some() {
            return;
        }

        let index = self.allocate_index();
        self.text_block_index = Some(index);
        events.push(anthropic::StreamEvent::ContentBlockStart {
            index,
            content_block: anthropic::ContentBlock::Text { text: String::new() },
        });
    }

    fn apply_tool_call_fragment(&mut self, fragment: &openai::ToolCallDelta, events: &mut Vec<anthropic::StreamEvent>) {
        let index = if let Some(index) = self.tool_block_index_by_upstream.get(&fragment.index) {
            *index
        } else {
            self.close_text_block(events);

            let index = self.allocate_index();
            self.tool_block_index_by_upstream.insert(fragment.index, index);

            events.push(anthropic::StreamEvent::ContentBlockStart {
                index,
                content_block: anthropic::ContentBlock::ToolUse {
                    id: fragment.id.clone().unwrap_or_default(),
                    name: fragment.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default(),
                    input: serde_json::json!({}),
                },
            });

            index
        };

        if let Some(arguments) = fragment.function.as_ref().and_then(|f| f.arguments.as_deref()) {
            self.output_chars += arguments.len() as u64;
            events.push(anthropic::StreamEvent::ContentBlockDelta {
                index,
                delta: anthropic::ContentDelta::InputJsonDelta {
                    partial_json: arguments.to_string(),
                },
            });
        }
    }

    fn allocate_index(&mut self) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        self.open_blocks.push(index);
        index
    }

    fn close_text_block(&mut self, events: &mut Vec<anthropic::StreamEvent>) {
        if let Some(index) = self.text_block_index.take() {
            events.push(anthropic::StreamEvent::ContentBlockStop { index });
            self.open_blocks.retain(|&i| i != index);
        }
    }

    fn close_all_blocks(&mut self, events: &mut Vec<anthropic::StreamEvent>) {
        let mut open = std::mem::take(&mut self.open_blocks);
        open.sort_unstable();
        for index in open {
            events.push(anthropic::StreamEvent::ContentBlockStop { index });
        }
        self.text_block_index = None;
        self.tool_block_index_by_upstream.clear();
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..24].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_chunk(text: &str) -> openai::ChatCompletionChunk {
        openai::ChatCompletionChunk {
            id: "c".to_string(),
            model: "m".to_string(),
            choices: vec![openai::ChunkChoice {
                index: 0,
                delta: openai::ChunkDelta {
                    content: Some(text.to_string()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
            usage: None,
        }
    }

    fn finish_chunk(reason: openai::FinishReason) -> openai::ChatCompletionChunk {
        openai::ChatCompletionChunk {
            id: "c".to_string(),
            model: "m".to_string(),
            choices: vec![openai::ChunkChoice {
                index: 0,
                delta: openai::ChunkDelta::default(),
                finish_reason: Some(reason),
            }],
            usage: None,
        }
    }

    #[test]
    fn text_then_finish_emits_expected_sequence() {
        let mut translator = StreamTranslator::new("mock-model".to_string());
        let mut events = Vec::new();
        events.extend(translator.on_chunk(&content_chunk("Hel")));
        events.extend(translator.on_chunk(&content_chunk("lo")));
        events.extend(translator.on_chunk(&finish_chunk(openai::FinishReason::Stop)));

        let kinds: Vec<&str> = events.iter().map(event_kind).collect();
        assert_eq!(
            kinds,
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
    }

    #[test]
    fn empty_stream_has_no_block_events() {
        let mut translator = StreamTranslator::new("mock-model".to_string());
        let events = translator.on_chunk(&finish_chunk(openai::FinishReason::Stop));
        let kinds: Vec<&str> = events.iter().map(event_kind).collect();
        assert_eq!(kinds, vec!["message_start", "message_delta", "message_stop"]);
    }

    #[test]
    fn tool_call_fragments_accumulate_into_one_block() {
        let mut translator = StreamTranslator::new("mock-model".to_string());
        let mut events = Vec::new();

        let first = openai::ChatCompletionChunk {
            id: "c".to_string(),
            model: "m".to_string(),
            choices: vec![openai::ChunkChoice {
                index: 0,
                delta: openai::ChunkDelta {
                    content: None,
                    tool_calls: Some(vec![openai::ToolCallDelta {
                        index: 0,
                        id: Some("call_1".to_string()),
                        function: Some(openai::FunctionCallDelta {
                            name: Some("get_weather".to_string()),
                            arguments: Some(r#"{"city":"#.to_string()),
                        }),
                    }]),
                },
                finish_reason: None,
            }],
            usage: None,
        };
        let second = openai::ChatCompletionChunk {
            id: "c".to_string(),
            model: "m".to_string(),
            choices: vec![openai::ChunkChoice {
                index: 0,
                delta: openai::ChunkDelta {
                    content: None,
                    tool_calls: Some(vec![openai::ToolCallDelta {
                        index: 0,
                        id: None,
                        function: Some(openai::FunctionCallDelta {
                            name: None,
                            arguments: Some(r#""SF"}"#.to_string()),
                        }),
                    }]),
                },
                finish_reason: None,
            }],
            usage: None,
        };

        events.extend(translator.on_chunk(&first));
        events.extend(translator.on_chunk(&second));
        events.extend(translator.on_chunk(&finish_chunk(openai::FinishReason::ToolCalls)));

        let starts: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, anthropic::StreamEvent::ContentBlockStart { .. }))
            .collect();
        assert_eq!(starts.len(), 1, "a single tool_use block should open, not one per fragment");

        let stops: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, anthropic::StreamEvent::ContentBlockStop { .. }))
            .collect();
        assert_eq!(stops.len(), 1);
    }

    #[test]
    fn upstream_end_without_finish_reason_acts_like_stop() {
        let mut translator = StreamTranslator::new("mock-model".to_string());
        let mut events = translator.on_chunk(&content_chunk("hi"));
        events.extend(translator.on_upstream_end());

        let last_two: Vec<&str> = events.iter().rev().take(2).map(event_kind).collect();
        assert_eq!(last_two, vec!["message_stop", "message_delta"]);
        assert!(translator.is_closed());
    }

    fn event_kind(event: &anthropic::StreamEvent) -> &'static str {
        match event {
            anthropic::StreamEvent::MessageStart { .. } => "message_start",
            anthropic::StreamEvent::ContentBlockStart { .. } => "content_block_start",
            anthropic::StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            anthropic::StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            anthropic::StreamEvent::MessageDelta { .. } => "message_delta",
            anthropic::StreamEvent::MessageStop => "message_stop",
            anthropic::StreamEvent::Error { .. } => "error",
        }
    }
}
