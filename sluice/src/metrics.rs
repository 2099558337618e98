//! Metrics for sluice pipelines.
//!
//! Lightweight counters for observability

use std::sync::atomic::{ AtomicU64, Ordering };

/// Global metrics counters
pub struct Metrics {
    pub publishes: AtomicU64,
    pub events_processed: AtomicU64,
    pub batches: AtomicU64,
    pub handler_errors: AtomicU64,
    pub timeouts: AtomicU64,
    pub capacity_stalls: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            publishes: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            capacity_stalls: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_batch(&self, events: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.events_processed.fetch_add(events, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_capacity_stall(&self) {
        self.capacity_stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            publishes: self.publishes.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            capacity_stalls: self.capacity_stalls.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.publishes.store(0, Ordering::Relaxed);
        self.events_processed.store(0, Ordering::Relaxed);
        self.batches.store(0, Ordering::Relaxed);
        self.handler_errors.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.capacity_stalls.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub publishes: u64,
    pub events_processed: u64,
    pub batches: u64,
    pub handler_errors: u64,
    pub timeouts: u64,
    pub capacity_stalls: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pub={} ev={} batches={} errors={} timeouts={} stalls={}",
            self.publishes,
            self.events_processed,
            self.batches,
            self.handler_errors,
            self.timeouts,
            self.capacity_stalls
        )
    }
}

/// Global metrics instance
pub static METRICS: Metrics = Metrics::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let m = Metrics::new();
        m.record_publish();
        m.record_batch(16);
        m.record_handler_error();

        let s = m.snapshot();
        assert_eq!(s.publishes, 1);
        assert_eq!(s.batches, 1);
        assert_eq!(s.events_processed, 16);
        assert_eq!(s.handler_errors, 1);

        m.reset();
        assert_eq!(m.snapshot().events_processed, 0);
    }
}
