//! Shared, request-reachable state (spec §5): one `Arc<AppState>` cloned into every handler.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Instant,
};

use config::Config;
use dashmap::DashMap;
use events::EventBus;
use perf::{CircuitBreaker, LatencyHistogram, RateLimiter, ResourceMonitor};
use providers::ProviderRegistry;

/// Everything a request handler needs, built once at startup from a [`Config`] snapshot.
///
/// The config itself lives behind a read/write lock so a future reload can swap the `Arc`
/// under writers while in-flight requests keep using the snapshot they started with (spec §5).
pub struct AppState {
    config: RwLock<std::sync::Arc<Config>>,
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) breakers: DashMap<String, CircuitBreaker>,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) resource_monitor: ResourceMonitor,
    pub(crate) histogram: LatencyHistogram,
    pub(crate) events: EventBus,
    pub(crate) http: reqwest::Client,
    pub(crate) started_at: Instant,
    pub(crate) total_requests: AtomicU64,
    pub(crate) failed_requests: AtomicU64,
}

impl AppState {
    /// Build the shared application state from a loaded configuration document.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let events = EventBus::new(1024, 256);
        let registry = Arc::new(ProviderRegistry::from_config(&config, events.clone()));

        let breakers = DashMap::new();
        if config.performance.circuit_breaker.enabled {
            for name in registry.provider_names() {
                breakers.insert(
                    name.clone(),
                    CircuitBreaker::new(name, config.performance.circuit_breaker.clone(), events.clone()),
                );
            }
        }

        let rate_limiter = RateLimiter::new(&config.performance.rate_limit);
        let resource_monitor = ResourceMonitor::new(&config.performance);
        let http = reqwest::Client::builder()
            .timeout(config.performance.request_timeout())
            .build()
            .map_err(|err| anyhow::anyhow!("failed to build upstream HTTP client: {err}"))?;

        Ok(Self {
            config: RwLock::new(std::sync::Arc::new(config)),
            registry,
            breakers,
            rate_limiter,
            resource_monitor,
            histogram: LatencyHistogram::new(),
            events,
            http,
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        })
    }

    /// The current configuration snapshot. Cheap: clones an `Arc`.
    pub fn config(&self) -> std::sync::Arc<Config> {
        self.config.read().expect("config lock poisoned").clone()
    }

    /// Swap in a freshly loaded configuration. Requests already in flight keep the old snapshot.
    pub fn reload_config(&self, config: Config) {
        *self.config.write().expect("config lock poisoned") = std::sync::Arc::new(config);
    }

    /// A cloned handle to the provider registry, for the standalone health-probe worker.
    pub fn registry(&self) -> Arc<ProviderRegistry> {
        Arc::clone(&self.registry)
    }

    /// Circuit breaker for `provider`, if the breaker is enabled and the provider is known.
    pub fn breaker(&self, provider: &str) -> Option<dashmap::mapref::one::Ref<'_, String, CircuitBreaker>> {
        self.breakers.get(provider)
    }

    pub(crate) fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Seconds since the process started serving.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Total requests handled (success and failure) since startup.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Total requests that ended in a non-2xx response since startup.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }
}
