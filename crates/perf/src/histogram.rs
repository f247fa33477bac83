use std::sync::Mutex;

use hdrhistogram::Histogram;

const MAX_LATENCY_MS: u64 = 5 * 60 * 1000;
const SIGNIFICANT_DIGITS: u8 = 3;

/// Request-latency percentile tracking, in milliseconds.
pub struct LatencyHistogram {
    inner: Mutex<Histogram<u64>>,
}

impl LatencyHistogram {
    /// A histogram covering 1ms–5min latencies at 3 significant decimal digits.
    pub fn new() -> Self {
        let histogram =
            Histogram::new_with_bounds(1, MAX_LATENCY_MS, SIGNIFICANT_DIGITS).expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    /// Record one request's latency.
    pub fn record(&self, latency_ms: u64) {
        let mut histogram = self.inner.lock().expect("histogram lock poisoned");
        let clamped = latency_ms.min(MAX_LATENCY_MS);
        let _ = histogram.record(clamped.max(1));
    }

    /// The given percentile (0.0–100.0) in milliseconds.
    pub fn percentile(&self, percentile: f64) -> u64 {
        self.inner.lock().expect("histogram lock poisoned").value_at_percentile(percentile)
    }

    /// Total samples recorded.
    pub fn len(&self) -> u64 {
        self.inner.lock().expect("histogram lock poisoned").len()
    }

    /// Whether any samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_reflect_recorded_samples() {
        let histogram = LatencyHistogram::new();
        for ms in 1..=100 {
            histogram.record(ms);
        }
        assert_eq!(histogram.len(), 100);
        assert!(histogram.percentile(50.0) <= 55);
        assert!(histogram.percentile(99.0) >= 95);
    }

    #[test]
    fn empty_histogram_has_zero_percentiles() {
        let histogram = LatencyHistogram::new();
        assert!(histogram.is_empty());
        assert_eq!(histogram.percentile(99.0), 0);
    }
}
