//! Protocol translation (spec §4.3, §4.4): Anthropic Messages ⇄ OpenAI Chat Completions.

pub mod hooks;
pub mod request;
pub mod response;
pub mod stream;
