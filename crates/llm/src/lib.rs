//! Anthropic ⇄ OpenAI protocol translation, routing, and token estimation.
//!
//! This crate is pure: no I/O, no upstream calls. `providers` and `server` drive it.

#![deny(missing_docs)]

pub mod error;
pub mod protocol;
pub mod router;
pub mod token_estimator;
pub mod transform;

pub use error::{ProxyError, Result};
pub use router::{route, MatchedRoute, RouteDecision};
pub use token_estimator::estimate_tokens;
