use std::sync::{Arc, Mutex};
use std::time::Duration;

use config::{Config, ProviderConfig};
use dashmap::DashMap;
use events::{Event, EventBus, EventType};
use llm::{ProxyError, Result};

use crate::stats::{ProviderStats, ProviderStatsSnapshot};

const CONSECUTIVE_FAILURES_TO_UNHEALTHY: u32 = 3;

struct HealthState {
    healthy: bool,
    consecutive_failures: u32,
}

pub(crate) struct ProviderEntry {
    config: Mutex<ProviderConfig>,
    health: Mutex<HealthState>,
    stats: ProviderStats,
}

impl ProviderEntry {
    fn new(config: ProviderConfig) -> Self {
        Self {
            config: Mutex::new(config),
            health: Mutex::new(HealthState {
                healthy: true,
                consecutive_failures: 0,
            }),
            stats: ProviderStats::default(),
        }
    }

    fn config(&self) -> ProviderConfig {
        self.config.lock().expect("config lock poisoned").clone()
    }
}

/// Mirrors the enabled providers from a config snapshot, tracking health and per-provider
/// stats (spec §4.5).
pub struct ProviderRegistry {
    entries: DashMap<String, Arc<ProviderEntry>>,
    events: EventBus,
}

impl ProviderRegistry {
    /// Build a registry mirroring every provider in `config`, enabled or not. All start healthy;
    /// a disabled provider is simply never selected or probed until toggled on (see
    /// [`Self::set_enabled`]).
    pub fn from_config(config: &Config, events: EventBus) -> Self {
        let entries = DashMap::new();
        for (name, provider) in &config.providers {
            entries.insert(name.clone(), Arc::new(ProviderEntry::new(provider.clone())));
        }

        Self { entries, events }
    }

    /// `SelectProvider(model, requires_tool)`: the first enabled, healthy provider whose model
    /// list contains `model`. `requires_tool` is accepted for API parity with spec §4.5; every
    /// configured provider here speaks the OpenAI-compatible tool-calling wire shape, so it does
    /// not currently filter anything (see DESIGN.md).
    pub fn select(&self, model: &str, _requires_tool: bool) -> Result<String> {
        for entry in self.entries.iter() {
            let config = entry.config();
            if !config.enabled {
                continue;
            }
            let healthy = entry.health.lock().expect("health lock poisoned").healthy;
            if healthy && config.models.iter().any(|m| m == model) {
                return Ok(entry.key().clone());
            }
        }

        Err(ProxyError::NotFound(format!("no_healthy_provider for model '{model}'")))
    }

    /// Provider config, for dispatch (base URL, API key, transformer names).
    pub fn provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.entries.get(provider).map(|e| e.config())
    }

    /// All registered provider names (enabled or not), for iteration (health probing,
    /// `GET /providers`).
    pub fn provider_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Record one completed dispatch: updates stats and, on failure, nudges the consecutive
    /// failure counter (but does not itself flip health — that's the probe worker's job per
    /// spec §4.5, which only specifies probe outcomes as the health signal).
    pub fn record_outcome(&self, provider: &str, success: bool, latency: Duration) {
        if let Some(entry) = self.entries.get(provider) {
            entry.stats.record(success, latency);
        }
    }

    /// Whether the named provider is enabled and currently considered healthy.
    pub fn is_healthy(&self, provider: &str) -> bool {
        self.entries
            .get(provider)
            .map(|e| e.config().enabled && e.health.lock().expect("health lock poisoned").healthy)
            .unwrap_or(false)
    }

    /// A consistent snapshot of one provider's exported stats.
    pub fn stats_snapshot(&self, provider: &str) -> Option<ProviderStatsSnapshot> {
        self.entries.get(provider).map(|e| e.stats.snapshot())
    }

    /// The provider's current config and stats together, for `GET /providers[/id]` (spec §6.1,
    /// with the `[AMBIENT]` stats-on-list enrichment).
    pub fn describe(&self, provider: &str) -> Option<(ProviderConfig, ProviderStatsSnapshot, bool)> {
        let entry = self.entries.get(provider)?;
        Some((entry.config(), entry.stats.snapshot(), self.is_healthy(provider)))
    }

    /// Create or replace a provider's configuration (`POST`/`PUT /providers/:id`). Health and
    /// stats reset, matching the fresh-entry behavior `from_config` gives a newly-seen provider.
    pub fn upsert(&self, id: String, config: ProviderConfig) {
        self.entries.insert(id, Arc::new(ProviderEntry::new(config)));
    }

    /// Remove a provider entirely (`DELETE /providers/:id`). Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Flip a provider's `enabled` flag (`PATCH /providers/:id/toggle`). Returns the new value,
    /// or `None` if the provider doesn't exist.
    pub fn toggle(&self, id: &str) -> Option<bool> {
        self.set_enabled(id, None)
    }

    /// Set (or, if `enabled` is `None`, flip) a provider's `enabled` flag, in place: stats and
    /// health carry over, unlike [`Self::upsert`]. Returns the resulting value.
    pub fn set_enabled(&self, id: &str, enabled: Option<bool>) -> Option<bool> {
        let entry = self.entries.get(id)?;
        let mut config = entry.config.lock().expect("config lock poisoned");
        config.enabled = enabled.unwrap_or(!config.enabled);
        Some(config.enabled)
    }

    /// Apply one health-probe outcome: three consecutive failures marks the provider unhealthy;
    /// any success restores it. Publishes a [`EventType::ProviderHealthChanged`] event on
    /// transition.
    pub(crate) fn apply_probe_result(&self, provider: &str, success: bool) {
        let Some(entry) = self.entries.get(provider) else {
            return;
        };

        let transitioned = {
            let mut health = entry.health.lock().expect("health lock poisoned");
            let was_healthy = health.healthy;

            if success {
                health.consecutive_failures = 0;
                health.healthy = true;
            } else {
                health.consecutive_failures += 1;
                if health.consecutive_failures >= CONSECUTIVE_FAILURES_TO_UNHEALTHY {
                    health.healthy = false;
                }
            }

            was_healthy != health.healthy
        };

        if transitioned {
            let healthy = self.is_healthy(provider);
            log::info!("provider '{provider}' health changed: healthy={healthy}");
            self.events.publish(
                Event::new(EventType::ProviderHealthChanged, "providers")
                    .with_attribute("provider", provider)
                    .with_attribute("healthy", healthy.to_string()),
            );
        }
    }
}
