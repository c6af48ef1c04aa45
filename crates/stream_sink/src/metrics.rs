//! Per-destination delivery counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single destination
#[derive(Debug, Default)]
pub struct DestinationMetrics {
    /// Write requests issued
    request_count: AtomicU64,
    /// Requests that failed as a whole
    request_failure_count: AtomicU64,
    /// Events acknowledged
    records_succeeded: AtomicU64,
    /// Events rejected or part of a failed request
    records_failed: AtomicU64,
    /// Retries scheduled against this destination
    retry_count: AtomicU64,
    /// Times this destination exhausted its retries and handed events on
    failover_count: AtomicU64,
}

impl DestinationMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_request_failure_count(&self) {
        self.request_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_succeeded(&self, count: usize) {
        self.records_succeeded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_records_failed(&self, count: usize) {
        self.records_failed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn inc_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failover_count(&self) {
        self.failover_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            request_count: self.request_count.load(Ordering::Relaxed),
            request_failure_count: self.request_failure_count.load(Ordering::Relaxed),
            records_succeeded: self.records_succeeded.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            retry_count: self.retry_count.load(Ordering::Relaxed),
            failover_count: self.failover_count.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of destination metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub request_failure_count: u64,
    pub records_succeeded: u64,
    pub records_failed: u64,
    pub retry_count: u64,
    pub failover_count: u64,
}
