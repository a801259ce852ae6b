//! Metrics definitions for the token cache.
//!
//! All metrics follow Prometheus naming conventions:
//! - `token_cache_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `tier`: 2 values (l1, l2)
//! - `outcome`: hit, miss, expired, corrupt
//! - `operation`: bounded Redis commands (get, set, del, scan, ping)
//! - `result`: valid, invalid, error, timeout
//!
//! No recorder is installed here; the host process owns the exporter.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record the outcome of a tier lookup.
///
/// Metric: `token_cache_lookups_total`
/// Labels: `tier`, `outcome`
pub fn record_lookup(tier: &'static str, outcome: &'static str) {
    counter!("token_cache_lookups_total",
        "tier" => tier,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a tier-2 failure.
///
/// Metric: `token_cache_tier2_errors_total`
/// Labels: `operation`
pub fn record_tier2_error(operation: &'static str) {
    counter!("token_cache_tier2_errors_total", "operation" => operation).increment(1);
}

/// Record a remote validation call and its latency.
///
/// Metric: `token_cache_remote_calls_total`, `token_cache_remote_call_duration_seconds`
/// Labels: `result`
pub fn record_remote_call(result: &'static str, duration: Duration) {
    histogram!("token_cache_remote_call_duration_seconds").record(duration.as_secs_f64());

    counter!("token_cache_remote_calls_total", "result" => result).increment(1);
}

/// Record a bulk or selective invalidation.
///
/// Metric: `token_cache_invalidations_total`
/// Labels: `scope` (all, token)
pub fn record_invalidation(scope: &'static str) {
    counter!("token_cache_invalidations_total", "scope" => scope).increment(1);
}
