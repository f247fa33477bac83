//! Performance monitor (spec §4.7–§4.8): rate limiting, circuit breaking, resource caps and
//! latency histograms.

#![deny(missing_docs)]

mod breaker;
mod histogram;
mod rate_limit;
mod resource;

pub use breaker::{BreakerState, CircuitBreaker};
pub use histogram::LatencyHistogram;
pub use rate_limit::RateLimiter;
pub use resource::ResourceMonitor;
