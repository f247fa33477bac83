use std::{
    num::NonZeroU32,
    sync::atomic::{AtomicU64, Ordering},
};

use config::RateLimitConfig;
use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovernorLimiter,
};
use nonzero_ext::nonzero;

/// Token-bucket limiter keyed by caller IP, API key, or provider name (spec §4.7).
pub struct RateLimiter {
    enabled: bool,
    limiter: GovernorLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    hits: AtomicU64,
}

impl RateLimiter {
    /// Build a limiter from config. `per_minute / 60` tokens/sec, burst capacity `burst`.
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_minute = NonZeroU32::new(config.per_minute).unwrap_or(nonzero!(1u32));
        let burst = NonZeroU32::new(config.burst).unwrap_or(nonzero!(1u32));
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            enabled: config.enabled,
            limiter: GovernorLimiter::keyed(quota),
            hits: AtomicU64::new(0),
        }
    }

    /// `Allow(key)`: whether a token was available for this key. Disabled limiters always allow.
    pub fn allow(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Total `Allow` calls made, admitted or not.
    pub fn total_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Drop buckets for keys that have been idle long enough to have fully refilled; called
    /// periodically at `cleanup_interval_secs` (spec §4.7: "limiters for keys idle for longer
    /// than the cleanup interval are evicted").
    pub fn cleanup(&self) {
        self.limiter.retain_recent();
    }
}
