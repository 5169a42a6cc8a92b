// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Structured cache events.
//!
//! Every component reports what it does through an injected [`EventSink`]
//! instead of calling a logging backend directly. The default sink,
//! [`TracingSink`], turns events into `tracing` log lines and `metrics`
//! samples. Embedders that want a different backend implement the trait.
//!
//! ```
//! use tiered_cache::events::{CacheEvent, EventSink};
//!
//! struct Counting(std::sync::atomic::AtomicUsize);
//!
//! impl EventSink for Counting {
//!     fn emit(&self, _event: &CacheEvent<'_>) {
//!         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!     }
//! }
//! ```

use std::error::Error;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::metrics;

/// Something observable happened inside the cache.
#[derive(Debug, Clone, Copy)]
pub enum CacheEvent<'a> {
    /// Served from the in-process tier.
    MemoryHit { key: &'a str },
    /// Not resident in the in-process tier.
    MemoryMiss { key: &'a str },
    /// Value written to the in-process tier.
    MemoryWrite { key: &'a str },
    /// Capacity eviction of the least-recently-used entry.
    Evicted { key: &'a str },
    /// A miss was filled from the durable tier.
    FilledFromDurable { key: &'a str, bytes: usize },
    DurableWrite { key: &'a str, bytes: usize },
    DurableWriteFailed { key: &'a str, error: &'a (dyn Error + 'a) },
    DurableReadFailed { key: &'a str, error: &'a (dyn Error + 'a) },
    Deleted { key: &'a str },
    DeleteFailed { key: &'a str, error: &'a (dyn Error + 'a) },
    EncodeFailed { key: &'a str, error: &'a (dyn Error + 'a) },
    Incremented { key: &'a str, value: i64 },
    /// A remote operation failed and will be attempted again after `delay`.
    RetryScheduled {
        operation: &'a str,
        attempt: usize,
        max_attempts: usize,
        delay: Duration,
        error: &'a (dyn Error + 'a),
    },
    /// A remote operation succeeded after at least one failed attempt.
    RetryRecovered { operation: &'a str, attempts: usize },
    RetryExhausted {
        operation: &'a str,
        attempts: usize,
        error: &'a (dyn Error + 'a),
    },
    SweepStarted { pattern: &'a str },
    SweepKeySkipped { key: &'a str, error: &'a (dyn Error + 'a) },
    SweepAborted { pattern: &'a str, error: &'a (dyn Error + 'a) },
    SweepCompleted {
        pattern: &'a str,
        scanned: usize,
        refreshed: usize,
        skipped: usize,
        elapsed: Duration,
    },
    ReconcilerStarted { pattern: &'a str, interval: Duration },
    ReconcilerStopped { pattern: &'a str, sweeps: u64 },
    /// The periodic task ended abnormally (a sweep panicked).
    ReconcilerCrashed { pattern: &'a str, error: &'a (dyn Error + 'a) },
}

impl CacheEvent<'_> {
    /// Stable short name, handy for assertions and metric labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MemoryHit { .. } => "memory_hit",
            Self::MemoryMiss { .. } => "memory_miss",
            Self::MemoryWrite { .. } => "memory_write",
            Self::Evicted { .. } => "evicted",
            Self::FilledFromDurable { .. } => "filled_from_durable",
            Self::DurableWrite { .. } => "durable_write",
            Self::DurableWriteFailed { .. } => "durable_write_failed",
            Self::DurableReadFailed { .. } => "durable_read_failed",
            Self::Deleted { .. } => "deleted",
            Self::DeleteFailed { .. } => "delete_failed",
            Self::EncodeFailed { .. } => "encode_failed",
            Self::Incremented { .. } => "incremented",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::RetryRecovered { .. } => "retry_recovered",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::SweepStarted { .. } => "sweep_started",
            Self::SweepKeySkipped { .. } => "sweep_key_skipped",
            Self::SweepAborted { .. } => "sweep_aborted",
            Self::SweepCompleted { .. } => "sweep_completed",
            Self::ReconcilerStarted { .. } => "reconciler_started",
            Self::ReconcilerStopped { .. } => "reconciler_stopped",
            Self::ReconcilerCrashed { .. } => "reconciler_crashed",
        }
    }

    /// The cache key this event concerns, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match *self {
            Self::MemoryHit { key }
            | Self::MemoryMiss { key }
            | Self::MemoryWrite { key }
            | Self::Evicted { key }
            | Self::FilledFromDurable { key, .. }
            | Self::DurableWrite { key, .. }
            | Self::DurableWriteFailed { key, .. }
            | Self::DurableReadFailed { key, .. }
            | Self::Deleted { key }
            | Self::DeleteFailed { key, .. }
            | Self::EncodeFailed { key, .. }
            | Self::Incremented { key, .. }
            | Self::SweepKeySkipped { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Receiver for [`CacheEvent`]s.
///
/// Called inline on the hot path, so implementations must be cheap and
/// must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CacheEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &CacheEvent<'_>) {}
}

/// Default sink: `tracing` for logs, `metrics` for numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CacheEvent<'_>) {
        match *event {
            CacheEvent::MemoryHit { key } => {
                debug!(key, "Cache hit (memory)");
                metrics::record_operation("memory", "get", "hit");
            }
            CacheEvent::MemoryMiss { key } => {
                debug!(key, "Cache miss, trying durable store");
                metrics::record_operation("memory", "get", "miss");
            }
            CacheEvent::MemoryWrite { key } => {
                debug!(key, "Set in memory");
                metrics::record_operation("memory", "set", "success");
            }
            CacheEvent::Evicted { key } => {
                debug!(key, "Evicted least-recently-used entry");
                metrics::record_eviction();
            }
            CacheEvent::FilledFromDurable { key, bytes } => {
                debug!(key, bytes, "Loaded from durable store into memory");
                metrics::record_operation("durable", "get", "success");
            }
            CacheEvent::DurableWrite { key, bytes } => {
                debug!(key, bytes, "Set in durable store");
                metrics::record_operation("durable", "set", "success");
                metrics::record_bytes("durable", "set", bytes);
            }
            CacheEvent::DurableWriteFailed { key, error } => {
                error!(key, error = %error, "Durable write failed; memory tier already holds the new value");
                metrics::record_operation("durable", "set", "error");
                metrics::record_error("durable", "set", "backend");
            }
            CacheEvent::DurableReadFailed { key, error } => {
                warn!(key, error = %error, "Durable get failed");
                metrics::record_operation("durable", "get", "error");
            }
            CacheEvent::Deleted { key } => {
                debug!(key, "Deleted from both tiers");
                metrics::record_operation("durable", "delete", "success");
            }
            CacheEvent::DeleteFailed { key, error } => {
                error!(key, error = %error, "Durable delete failed");
                metrics::record_operation("durable", "delete", "error");
                metrics::record_error("durable", "delete", "backend");
            }
            CacheEvent::EncodeFailed { key, error } => {
                error!(key, error = %error, "Encode failed");
                metrics::record_error("memory", "set", "encode");
            }
            CacheEvent::Incremented { key, value } => {
                debug!(key, value, "Incremented in durable store, mirrored to memory");
                metrics::record_operation("durable", "incr_by", "success");
            }
            CacheEvent::RetryScheduled { operation, attempt, max_attempts, delay, error } => {
                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation, attempt, max_attempts, error, delay
                );
                metrics::record_retry(operation, "retry");
            }
            CacheEvent::RetryRecovered { operation, attempts } => {
                info!("Operation '{}' succeeded after {} retries", operation, attempts - 1);
                metrics::record_retry(operation, "recovered");
            }
            CacheEvent::RetryExhausted { operation, attempts, error } => {
                warn!(operation, attempts, error = %error, "Retry budget exhausted");
                metrics::record_retry(operation, "exhausted");
            }
            CacheEvent::SweepStarted { pattern } => {
                debug!(pattern, "Reconciliation sweep started");
            }
            CacheEvent::SweepKeySkipped { key, error } => {
                warn!(key, error = %error, "Skipping key during reconciliation");
                metrics::record_error("durable", "sweep", "key_skipped");
            }
            CacheEvent::SweepAborted { pattern, error } => {
                warn!(pattern, error = %error, "Reconciliation scan failed, sweep aborted");
                metrics::record_error("durable", "sweep", "scan");
            }
            CacheEvent::SweepCompleted { pattern, scanned, refreshed, skipped, elapsed } => {
                info!(pattern, scanned, refreshed, skipped, elapsed_ms = elapsed.as_millis() as u64, "Reconciliation sweep complete");
                metrics::record_sweep(elapsed, refreshed, skipped);
            }
            CacheEvent::ReconcilerStarted { pattern, interval } => {
                info!(pattern, ?interval, "Starting periodic reconciliation");
            }
            CacheEvent::ReconcilerStopped { pattern, sweeps } => {
                info!(pattern, sweeps, "Periodic reconciliation stopped");
            }
            CacheEvent::ReconcilerCrashed { pattern, error } => {
                error!(pattern, error = %error, "Periodic reconciliation task failed");
                metrics::record_error("memory", "reconcile", "task_failed");
            }
        }
    }
}

/// Records event names and keys for assertions in tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<(&'static str, Option<String>)>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded event names, oldest first.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|(name, _)| *name).collect()
    }

    /// How many times an event with `name` was emitted.
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|(n, _)| *n == name).count()
    }

    /// How many times `name` was emitted for `key`.
    pub fn count_for(&self, name: &str, key: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(n, k)| *n == name && k.as_deref() == Some(key))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl EventSink for RecordingSink {
    fn emit(&self, event: &CacheEvent<'_>) {
        self.events
            .lock()
            .push((event.name(), event.key().map(str::to_string)));
    }
}
