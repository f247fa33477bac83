//! Wire types for the two protocols ccproxy speaks: Anthropic (inbound/outbound to
//! callers) and OpenAI-compatible Chat Completions (outbound/inbound to upstreams).

pub mod anthropic;
pub mod openai;
