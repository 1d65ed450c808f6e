//! In-memory latency histogram for webhook delivery.
//! Each HTTP attempt is recorded, retries included.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

/// Shared latency stats. Notifier records, API reads.
/// Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<Option<Histogram<u64>>>,
}

impl LatencyStats {
    /// Tracks 1us to 100s, 3 significant figures.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Histogram::new_with_bounds(1, 100_000_000, 3).ok()),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(h) = guard.as_mut() {
                // Zero-length attempts (paused clocks, instant failures) clamp to the floor.
                let _ = h.record(us.max(1));
            }
        }
    }

    /// Return (p50_ms, p95_ms, p99_ms). None if no samples.
    pub fn percentiles_ms(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        let Ok(guard) = self.inner.lock() else {
            return (None, None, None);
        };
        let Some(h) = guard.as_ref().filter(|h| h.len() > 0) else {
            return (None, None, None);
        };
        let ms = |q: f64| Some(h.value_at_quantile(q) as f64 / 1000.0);
        (ms(0.5), ms(0.95), ms(0.99))
    }

    /// Sample count.
    pub fn len(&self) -> u64 {
        self.inner
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|h| h.len()))
            .unwrap_or(0)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
