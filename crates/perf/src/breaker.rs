use std::{sync::Mutex, time::Instant};

use config::CircuitBreakerConfig;
use events::{Event, EventBus, EventType};

/// Per-provider circuit breaker state (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests allowed; outcomes recorded.
    Closed,
    /// Requests rejected with `circuit_open`.
    Open,
    /// A limited number of probe requests allowed through.
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    total: u64,
    failures: u64,
    opened_at: Option<Instant>,
    half_open_admitted: u32,
    half_open_successes: u32,
}

/// A single provider's breaker. Guarded by its own lock (spec §5: "linearizable per provider via
/// a dedicated lock").
pub struct CircuitBreaker {
    provider: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    events: EventBus,
}

impl CircuitBreaker {
    /// Build a closed breaker for `provider`.
    pub fn new(provider: impl Into<String>, config: CircuitBreakerConfig, events: EventBus) -> Self {
        Self {
            provider: provider.into(),
            config,
            events,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                total: 0,
                failures: 0,
                opened_at: None,
                half_open_admitted: 0,
                half_open_successes: 0,
            }),
        }
    }

    /// `Allow()`: whether a request may proceed to this provider right now.
    ///
    /// A call that observes `open` past `open_duration` atomically flips to `half_open` (with
    /// its admission counter reset) and is itself admitted as the first half-open probe.
    pub fn allow(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_duration() {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_admitted = 1;
                    inner.half_open_successes = 0;
                    self.publish_transition(BreakerState::HalfOpen);
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_admitted < self.config.half_open_max {
                    inner.half_open_admitted += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record the outcome of a request this breaker admitted.
    pub fn record_outcome(&self, success: bool) {
        if !self.config.enabled {
            return;
        }

        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => {
                inner.total += 1;
                if success {
                    inner.consecutive_failures = 0;
                } else {
                    inner.failures += 1;
                    inner.consecutive_failures += 1;
                }

                let error_rate = inner.failures as f64 / inner.total as f64;
                let should_open = inner.consecutive_failures >= self.config.consecutive_failures
                    || (inner.total > 10 && error_rate >= self.config.error_threshold);

                if should_open {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    drop(inner);
                    self.publish_transition(BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                if !success {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    drop(inner);
                    self.publish_transition(BreakerState::Open);
                    return;
                }

                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_max {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.total = 0;
                    inner.failures = 0;
                    inner.opened_at = None;
                    drop(inner);
                    self.publish_transition(BreakerState::Closed);
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Current state, for diagnostics (`GET /providers`).
    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("circuit breaker lock poisoned").state
    }

    fn publish_transition(&self, state: BreakerState) {
        let name = match state {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        log::info!("circuit breaker for '{}' transitioned to {name}", self.provider);
        self.events.publish(
            Event::new(EventType::CircuitBreakerTransition, "circuit_breaker")
                .with_attribute("provider", self.provider.clone())
                .with_attribute("state", name),
        );
    }
}
