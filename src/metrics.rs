// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for tiered-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `tiered_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for size histograms
//!
//! # Labels
//! - `tier`: memory, durable
//! - `operation`: get, set, delete, incr_by, scan, sweep
//! - `status`: hit, miss, success, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a cache operation outcome
pub fn record_operation(tier: &str, operation: &str, status: &str) {
    counter!(
        "tiered_cache_operations_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(tier: &str, operation: &str, duration: Duration) {
    histogram!(
        "tiered_cache_operation_seconds",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record payload size moved to/from a tier
pub fn record_bytes(tier: &str, operation: &str, bytes: usize) {
    histogram!(
        "tiered_cache_payload_bytes",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .record(bytes as f64);
}

/// Record an LRU capacity eviction
pub fn record_eviction() {
    counter!("tiered_cache_evictions_total").increment(1);
}

/// Set current in-memory entry count
pub fn set_memory_items(count: usize) {
    gauge!("tiered_cache_memory_items").set(count as f64);
}

/// Record a retry outcome (`retry`, `recovered`, `exhausted`)
pub fn record_retry(operation: &str, outcome: &str) {
    counter!(
        "tiered_cache_retries_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a completed reconciliation sweep
pub fn record_sweep(duration: Duration, refreshed: usize, skipped: usize) {
    histogram!("tiered_cache_sweep_seconds").record(duration.as_secs_f64());
    counter!("tiered_cache_sweep_refreshed_total").increment(refreshed as u64);
    counter!("tiered_cache_sweep_skipped_total").increment(skipped as u64);
}

/// Record an error by tier, operation and kind
pub fn record_error(tier: &str, operation: &str, error_type: &str) {
    counter!(
        "tiered_cache_errors_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Records latency for `tier`/`operation` when dropped.
pub struct LatencyTimer {
    tier: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(tier: &'static str, operation: &'static str) -> Self {
        Self {
            tier,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.tier, self.operation, self.start.elapsed());
    }
}
