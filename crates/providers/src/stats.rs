use std::{
    sync::atomic::{AtomicU64, Ordering},
    sync::Mutex,
    time::{Duration, SystemTime},
};

/// Per-provider counters, exported at `GET /providers` (spec §4.5, §6).
pub(crate) struct ProviderStats {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    avg_latency_ms: Mutex<f64>,
    last_used: Mutex<Option<SystemTime>>,
}

impl Default for ProviderStats {
    fn default() -> Self {
        Self {
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            avg_latency_ms: Mutex::new(0.0),
            last_used: Mutex::new(None),
        }
    }
}

impl ProviderStats {
    /// Record one completed request: bumps totals, folds latency into the moving average, and
    /// stamps `last_used`. A single call per request, per spec §4.5.
    pub(crate) fn record(&self, success: bool, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        const ALPHA: f64 = 2.0 / 21.0; // EWMA over a ~20-sample window, per spec §4's defaults.
        let sample = latency.as_secs_f64() * 1000.0;
        let mut avg = self.avg_latency_ms.lock().expect("avg_latency_ms lock poisoned");
        *avg = if *avg == 0.0 { sample } else { ALPHA * sample + (1.0 - ALPHA) * *avg };

        *self.last_used.lock().expect("last_used lock poisoned") = Some(SystemTime::now());
    }

    pub(crate) fn snapshot(&self) -> ProviderStatsSnapshot {
        ProviderStatsSnapshot {
            total_requests: self.total.load(Ordering::Relaxed),
            successful_requests: self.successful.load(Ordering::Relaxed),
            failed_requests: self.failed.load(Ordering::Relaxed),
            avg_latency_ms: *self.avg_latency_ms.lock().expect("avg_latency_ms lock poisoned"),
            last_used: *self.last_used.lock().expect("last_used lock poisoned"),
        }
    }
}

/// A consistent read of one provider's stats, the shape `GET /providers` serializes.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ProviderStatsSnapshot {
    /// Total requests dispatched to this provider.
    pub total_requests: u64,
    /// Requests that completed successfully.
    pub successful_requests: u64,
    /// Requests that failed.
    pub failed_requests: u64,
    /// Exponentially-weighted moving average latency, in milliseconds.
    pub avg_latency_ms: f64,
    /// When this provider was last dispatched to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<SystemTime>,
}
