//! Shared health state for the /health endpoint.
//! Updated by the scheduler loop and the dispatch loop.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Local, TimeZone};

/// Shared health metrics. Written by the background loops, read by the API.
pub struct HealthState {
    started: Instant,
    /// Millisecond timestamp of the last scheduler tick (0 = none).
    last_tick_ms: AtomicI64,
    /// Millisecond timestamp of the last completed dispatch cycle (0 = none).
    last_dispatch_ms: AtomicI64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub skipped_cycles: AtomicU64,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            last_tick_ms: AtomicI64::new(0),
            last_dispatch_ms: AtomicI64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped_cycles: AtomicU64::new(0),
        }
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn record_tick(&self, at: DateTime<Local>) {
        self.last_tick_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, at: DateTime<Local>, delivered: u64, failed: u64) {
        self.last_dispatch_ms.store(at.timestamp_millis(), Ordering::Relaxed);
        self.delivered.fetch_add(delivered, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_tick(&self) -> Option<DateTime<Local>> {
        from_ms(self.last_tick_ms.load(Ordering::Relaxed))
    }

    pub fn last_dispatch(&self) -> Option<DateTime<Local>> {
        from_ms(self.last_dispatch_ms.load(Ordering::Relaxed))
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn skipped_cycles(&self) -> u64 {
        self.skipped_cycles.load(Ordering::Relaxed)
    }
}

fn from_ms(ms: i64) -> Option<DateTime<Local>> {
    if ms == 0 {
        return None;
    }
    Local.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_counters_accumulate() {
        let health = HealthState::new();
        assert!(health.last_dispatch().is_none());

        let at = Local.with_ymd_and_hms(2025, 6, 9, 14, 30, 0).unwrap();
        health.record_dispatch(at, 2, 1);
        health.record_dispatch(at, 1, 0);
        assert_eq!(health.delivered(), 3);
        assert_eq!(health.failed(), 1);
        assert_eq!(health.last_dispatch(), Some(at));
    }
}
