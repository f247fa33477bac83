//! Bounded in-process publish/subscribe event bus (spec §4.9).
//!
//! Used for metrics, audit trails, and state-transition notifications (provider health,
//! circuit breaker, rate limiting). The bus never blocks a publisher: a full channel drops
//! the event and increments a counter instead.

#![deny(missing_docs)]

mod bus;
mod event;

pub use bus::{EventBus, SubscribeOptions};
pub use event::{Event, EventType};

use std::sync::Arc;

use async_trait::async_trait;

/// A subscriber invoked for each published event matching its subscribed types.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Returning `Err` triggers the bus's retry policy.
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// Type alias for the shared-ownership form [`EventBus::subscribe`] expects.
pub type HandlerRef = Arc<dyn EventHandler>;
