// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retrying client for the durable tier.
//!
//! [`DurableClient`] is what the cache and the reconciler talk to. It wraps a
//! [`KvTransport`] and adds:
//! - the fixed retry policy around every single-key operation
//!   (3 attempts, 100ms apart by default),
//! - cursor pagination for [`scan_keys`](DurableClient::scan_keys).
//!
//! Errors from the transport are passed through untouched after the retry
//! budget is spent, so `NotFound` stays `NotFound` and a dropped connection
//! stays a connection error.

use std::collections::HashSet;
use std::sync::Arc;

use super::traits::{KvTransport, StorageError};
use crate::events::EventSink;
use crate::metrics::LatencyTimer;
use crate::resilience::retry::{retry, RetryConfig};

/// Default `COUNT` hint for SCAN pages.
pub const DEFAULT_SCAN_COUNT: usize = 100;

pub struct DurableClient {
    transport: Arc<dyn KvTransport>,
    retry: RetryConfig,
    scan_count: usize,
    events: Arc<dyn EventSink>,
}

impl DurableClient {
    pub fn new(transport: Arc<dyn KvTransport>, events: Arc<dyn EventSink>) -> Self {
        Self {
            transport,
            retry: RetryConfig::durable(),
            scan_count: DEFAULT_SCAN_COUNT,
            events,
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override the SCAN `COUNT` hint.
    #[must_use]
    pub fn with_scan_count(mut self, scan_count: usize) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let _timer = LatencyTimer::new("durable", "set");
        let transport = self.transport.clone();

        retry("durable_set", &self.retry, self.events.as_ref(), || {
            let transport = transport.clone();
            async move { transport.set(key, value).await }
        })
        .await
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let _timer = LatencyTimer::new("durable", "get");
        let transport = self.transport.clone();

        retry("durable_get", &self.retry, self.events.as_ref(), || {
            let transport = transport.clone();
            async move { transport.get(key).await }
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let _timer = LatencyTimer::new("durable", "delete");
        let transport = self.transport.clone();

        retry("durable_delete", &self.retry, self.events.as_ref(), || {
            let transport = transport.clone();
            async move { transport.delete(key).await }
        })
        .await
    }

    /// Atomic `INCRBY`. Note that a retried increment whose first attempt
    /// actually reached the server before failing may be applied twice.
    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        let _timer = LatencyTimer::new("durable", "incr_by");
        let transport = self.transport.clone();

        retry("durable_incr_by", &self.retry, self.events.as_ref(), || {
            let transport = transport.clone();
            async move { transport.incr_by(key, delta).await }
        })
        .await
    }

    /// Collect every key matching `pattern` by walking the SCAN cursor until
    /// it returns to `0`.
    ///
    /// Keys come back in server order with duplicates removed. Any failing
    /// page aborts the scan and discards what was gathered so far. Pages are
    /// not retried.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StorageError> {
        let _timer = LatencyTimer::new("durable", "scan");
        let mut cursor = 0u64;
        let mut seen: HashSet<String> = HashSet::new();
        let mut keys: Vec<String> = Vec::new();

        loop {
            let page = self
                .transport
                .scan_page(cursor, pattern, self.scan_count)
                .await?;

            for key in page.keys {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            cursor = page.cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}
