//! Per-instance cache counters.
//!
//! Counters are owned by one `CachedAuthClient` (no process-wide state) and
//! updated with atomic increments, so concurrent callers never lose counts.
//! Each increment is also mirrored to the `metrics` facade through
//! [`crate::observability::metrics`].

use crate::observability::metrics as obs;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic request-path counters.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    l1_hits: AtomicU64,
    l1_misses: AtomicU64,
    l2_hits: AtomicU64,
    l2_misses: AtomicU64,
    l2_errors: AtomicU64,
    grpc_calls: AtomicU64,
    total_requests: AtomicU64,
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub l2_errors: u64,
    pub grpc_calls: u64,
    pub total_requests: u64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_l1_hit(&self) {
        self.l1_hits.fetch_add(1, Ordering::Relaxed);
        obs::record_lookup("l1", "hit");
    }

    pub fn record_l1_miss(&self) {
        self.l1_misses.fetch_add(1, Ordering::Relaxed);
        obs::record_lookup("l1", "miss");
    }

    pub fn record_l2_hit(&self) {
        self.l2_hits.fetch_add(1, Ordering::Relaxed);
        obs::record_lookup("l2", "hit");
    }

    pub fn record_l2_miss(&self) {
        self.l2_misses.fetch_add(1, Ordering::Relaxed);
        obs::record_lookup("l2", "miss");
    }

    /// Record a tier-2 failure. `operation` is a bounded Redis command name.
    pub fn record_l2_error(&self, operation: &'static str) {
        self.l2_errors.fetch_add(1, Ordering::Relaxed);
        obs::record_tier2_error(operation);
    }

    pub fn record_grpc_call(&self) {
        self.grpc_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l1_misses: self.l1_misses.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            l2_misses: self.l2_misses.load(Ordering::Relaxed),
            l2_errors: self.l2_errors.load(Ordering::Relaxed),
            grpc_calls: self.grpc_calls.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter. Only called by a full cache clear.
    pub fn reset(&self) {
        for counter in [
            &self.l1_hits,
            &self.l1_misses,
            &self.l2_hits,
            &self.l2_misses,
            &self.l2_errors,
            &self.grpc_calls,
            &self.total_requests,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl MetricsSnapshot {
    /// Share of requests answered by either tier, as a percentage rounded to
    /// two decimals. Zero when no requests have been seen.
    pub fn hit_rate_percent(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        let hits = (self.l1_hits + self.l2_hits) as f64;
        let rate = hits / self.total_requests as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}
