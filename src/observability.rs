//! Fossilizer counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    leaves_accepted: AtomicU64,
    batches_sealed: AtomicU64,
    seal_failures: AtomicU64,
    batches_recovered: AtomicU64,
    events_delivered: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf_accepted(&self) {
        self.leaves_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_sealed(&self) {
        self.batches_sealed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_sealed", "Metric incremented");
    }

    pub fn seal_failed(&self) {
        self.seal_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "seal_failures", "Metric incremented");
    }

    pub fn batch_recovered(&self) {
        self.batches_recovered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_recovered", "Metric incremented");
    }

    pub fn event_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            leaves_accepted: self.leaves_accepted.load(Ordering::Relaxed),
            batches_sealed: self.batches_sealed.load(Ordering::Relaxed),
            seal_failures: self.seal_failures.load(Ordering::Relaxed),
            batches_recovered: self.batches_recovered.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub leaves_accepted: u64,
    pub batches_sealed: u64,
    pub seal_failures: u64,
    pub batches_recovered: u64,
    pub events_delivered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.leaf_accepted();
        metrics.leaf_accepted();
        metrics.batch_sealed();
        metrics.event_delivered();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.leaves_accepted, 2);
        assert_eq!(snapshot.batches_sealed, 1);
        assert_eq!(snapshot.seal_failures, 0);
        assert_eq!(snapshot.events_delivered, 1);
    }
}
