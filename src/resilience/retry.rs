// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded retry with a fixed pause between attempts.
//!
//! No exponential growth, no jitter, and no notion of
//! retryable vs non-retryable errors. Whatever the last attempt returned is
//! handed back to the caller unchanged.
//!
//! # Example
//!
//! ```
//! use tiered_cache::RetryConfig;
//! use std::time::Duration;
//!
//! // Remote operations: 3 attempts, 100ms apart
//! let durable = RetryConfig::durable();
//! assert_eq!(durable.max_attempts, 3);
//! assert_eq!(durable.backoff, Duration::from_millis(100));
//!
//! // Startup connection: a little more patient
//! let startup = RetryConfig::startup();
//! assert_eq!(startup.max_attempts, 5);
//! ```

use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::events::{CacheEvent, EventSink};

/// Retry policy: how many attempts, and how long to pause between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: usize,
    /// Fixed pause between consecutive attempts.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::durable()
    }
}

impl RetryConfig {
    /// Policy for every durable-store operation: 3 attempts, 100ms apart.
    /// Worst case adds ~200ms of sleeping on top of the round trips.
    #[must_use]
    pub fn durable() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }

    /// Policy for the initial connection: 5 attempts, 200ms apart.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(200),
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    /// Upper bound on time spent sleeping between attempts.
    #[must_use]
    pub fn worst_case_pause(&self) -> Duration {
        self.backoff * (self.max_attempts.max(1) as u32 - 1)
    }
}

/// Run `operation` until it succeeds or the attempt budget is spent.
///
/// Sleeps only *between* attempts; the final failure returns immediately.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    events: &dyn EventSink,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(val) => {
                if attempts > 1 {
                    events.emit(&CacheEvent::RetryRecovered {
                        operation: operation_name,
                        attempts,
                    });
                }
                return Ok(val);
            }
            Err(err) => {
                if attempts >= max_attempts {
                    if max_attempts > 1 {
                        events.emit(&CacheEvent::RetryExhausted {
                            operation: operation_name,
                            attempts,
                            error: &err,
                        });
                    }
                    return Err(err);
                }

                events.emit(&CacheEvent::RetryScheduled {
                    operation: operation_name,
                    attempt: attempts,
                    max_attempts,
                    delay: config.backoff,
                    error: &err,
                });

                sleep(config.backoff).await;
            }
        }
    }
}
