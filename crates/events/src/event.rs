use std::time::SystemTime;

use config::AttributeMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of event kinds the bus carries (spec §3's Event data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A Messages request was admitted and dispatch began.
    RequestReceived,
    /// A Messages request finished, successfully or not.
    RequestCompleted,
    /// A provider's health flipped healthy ⇄ unhealthy.
    ProviderHealthChanged,
    /// A circuit breaker changed state (closed/open/half_open).
    CircuitBreakerTransition,
    /// A caller was rejected by the rate limiter.
    RateLimitRejected,
    /// Upstream returned `function.arguments` that failed to parse as JSON.
    ToolArgsParseFailed,
}

/// One entry on the bus: an opaque, structured record of something that happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique id for this event.
    pub id: Uuid,
    /// What kind of event this is.
    pub event_type: EventType,
    /// When it was published.
    pub timestamp: SystemTime,
    /// Subsystem that published it, e.g. `"router"`, `"circuit_breaker"`, `"providers"`.
    pub source: String,
    /// Freeform key/value attributes, e.g. `{"provider": "openai"}`.
    pub attributes: AttributeMap,
    /// Error message, when this event records a failure.
    pub error: Option<String>,
}

impl Event {
    /// Build an event with no attributes and no error, timestamped now.
    pub fn new(event_type: EventType, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp: SystemTime::now(),
            source: source.into(),
            attributes: AttributeMap::new(),
            error: None,
        }
    }

    /// Attach a single attribute, builder-style.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attach an error message, builder-style.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}
