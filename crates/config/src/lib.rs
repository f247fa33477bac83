//! ccproxy configuration structures, mapping the `ccproxy.toml` document.

#![deny(missing_docs)]

mod loader;

use std::{collections::BTreeMap, path::Path, time::Duration};

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;

/// Top-level configuration document.
///
/// Unknown keys are rejected at load time (`deny_unknown_fields`), matching
/// the wire contract described in the configuration section of the spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bind host. Defaults to loopback.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Optional API key the proxy itself requires from callers.
    pub api_key: Option<SecretString>,
    /// Logging configuration.
    pub log: LogConfig,
    /// Performance-related limits (timeouts, size caps, rate limiting, circuit breaker).
    pub performance: PerformanceConfig,
    /// Configured upstream providers, keyed by provider name.
    pub providers: IndexMap<String, ProviderConfig>,
    /// Named routes, keyed by route name.
    pub routes: IndexMap<String, RouteConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            api_key: None,
            log: LogConfig::default(),
            performance: PerformanceConfig::default(),
            providers: IndexMap::new(),
            routes: IndexMap::new(),
        }
    }
}

impl Config {
    /// Load and validate a configuration document from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path.as_ref())
    }

    /// Validate semantic constraints that serde alone cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }

    /// Returns true if at least one provider is enabled.
    pub fn has_enabled_providers(&self) -> bool {
        self.providers.values().any(|p| p.enabled)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Enable file logging in addition to stderr.
    pub enabled: bool,
    /// Log file path, used only when `enabled`.
    pub file: Option<String>,
    /// Log level filter, e.g. "info", "ccproxy=debug".
    pub level: String,
    /// Log format: "text" or "json".
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: None,
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable colored text.
    Text,
    /// Newline-delimited JSON.
    Json,
}

/// Performance, resource-cap and resiliency configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerformanceConfig {
    /// Timeout for a single upstream call, in seconds.
    pub request_timeout_secs: u64,
    /// Maximum accepted request body size, in bytes.
    pub max_request_body: usize,
    /// Maximum accepted upstream response body size, in bytes.
    pub max_response_body: usize,
    /// Maximum resident memory, in bytes, before `resource_exhausted` is raised.
    pub max_memory: Option<usize>,
    /// Maximum concurrently in-flight requests before `resource_exhausted` is raised.
    pub max_tasks: Option<usize>,
    /// Graceful shutdown drain timeout, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,
    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Health probe interval, in seconds.
    pub health_probe_interval_secs: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_request_body: 10 * 1024 * 1024,
            max_response_body: 50 * 1024 * 1024,
            max_memory: None,
            max_tasks: None,
            shutdown_timeout_secs: 5,
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            health_probe_interval_secs: 30,
        }
    }
}

impl PerformanceConfig {
    /// Upstream call timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Graceful shutdown drain timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Health probe interval as a [`Duration`].
    pub fn health_probe_interval(&self) -> Duration {
        Duration::from_secs(self.health_probe_interval_secs)
    }
}

/// Key used to bucket the token-bucket rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKeyBy {
    /// Bucket per client IP address.
    Ip,
    /// Bucket per (hashed) API key.
    ApiKey,
    /// Bucket per upstream provider name.
    Provider,
}

/// Token-bucket rate limiter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enforced at all.
    pub enabled: bool,
    /// Sustained request budget per minute.
    pub per_minute: u32,
    /// Burst size (bucket capacity).
    pub burst: u32,
    /// Bucketing strategy.
    pub key_by: RateLimitKeyBy,
    /// Idle buckets older than this are evicted, in seconds.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            per_minute: 600,
            burst: 20,
            key_by: RateLimitKeyBy::ApiKey,
            cleanup_interval_secs: 300,
        }
    }
}

/// Per-provider circuit breaker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Whether the circuit breaker is enforced at all.
    pub enabled: bool,
    /// Consecutive failures (while closed) that trip the breaker.
    pub consecutive_failures: u32,
    /// Error-rate threshold (0.0-1.0) that trips the breaker once `total > 10`.
    pub error_threshold: f64,
    /// How long the breaker stays open before allowing a half-open probe, in seconds.
    pub open_duration_secs: u64,
    /// Number of concurrent successes required in half-open before closing.
    pub half_open_max: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            consecutive_failures: 5,
            error_threshold: 0.5,
            open_duration_secs: 30,
            half_open_max: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Open-state duration as a [`Duration`].
    pub fn open_duration(&self) -> Duration {
        Duration::from_secs(self.open_duration_secs)
    }
}

/// A single configured upstream provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL for the provider's OpenAI-compatible API, e.g. `https://api.example.com/v1`.
    pub api_base_url: String,
    /// API key presented to the upstream provider.
    pub api_key: SecretString,
    /// Model identifiers this provider supports.
    pub models: Vec<String>,
    /// Whether the provider is enabled for routing and health probing.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional named pre/post-dispatch transformer chain.
    #[serde(default)]
    pub transformers: TransformerChain,
}

fn default_true() -> bool {
    true
}

/// Named pre-dispatch / post-dispatch transformer hooks for a provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformerChain {
    /// Transformer applied to the outbound (OpenAI-shape) request before dispatch.
    pub request: Option<String>,
    /// Transformer applied to the inbound (OpenAI-shape) response before translation back.
    pub response: Option<String>,
}

/// A named route: binds a route name to a concrete (provider, model) pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Target provider name.
    pub provider: String,
    /// Target model name at that provider.
    pub model: String,
}

/// Reserved route names with routing significance (see the router).
pub const RESERVED_ROUTES: &[&str] = &["default", "long_context", "background", "think"];

/// Transformer names recognized by the pre/post-dispatch hook chain.
///
/// Unknown names in `providers.*.transformers` fail config validation at load,
/// per the spec's "unknown transformer names cause config validation to fail".
pub const KNOWN_TRANSFORMERS: &[&str] = &["passthrough", "strip_unknown_fields"];

/// Arbitrary attribute map used by events and metrics records.
pub type AttributeMap = BTreeMap<String, String>;
