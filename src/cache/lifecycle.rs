//! Construction and shutdown.
//!
//! Startup sequence:
//! 1. Validate config (zero capacity, zero scan count, empty pattern rejected)
//! 2. Connect the durable transport (Redis unless one was injected)
//! 3. Optional synchronous sweep (`sync_at_start`), failures absorbed
//! 4. Optional periodic reconciler (`sync_interval_ms > 0`)

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::codec::{PayloadCodec, ZstdCodec};
use crate::config::TieredCacheConfig;
use crate::events::{CacheEvent, EventSink, TracingSink};
use crate::eviction::lru::LruStore;
use crate::reconcile::Reconciler;
use crate::resilience::retry::RetryConfig;
use crate::storage::durable::DurableClient;
use crate::storage::redis::RedisTransport;
use crate::storage::traits::KvTransport;

use super::{CacheError, TieredCache};

/// Builder for [`TieredCache`] with injectable collaborators.
///
/// Anything not injected gets the production default: a Redis transport
/// built from the config, [`TracingSink`], [`ZstdCodec`] and
/// [`RetryConfig::durable`].
pub struct TieredCacheBuilder {
    config: TieredCacheConfig,
    transport: Option<Arc<dyn KvTransport>>,
    events: Option<Arc<dyn EventSink>>,
    codec: Option<Arc<dyn PayloadCodec>>,
    retry: Option<RetryConfig>,
    cancel: Option<watch::Receiver<bool>>,
}

impl TieredCacheBuilder {
    fn new(config: TieredCacheConfig) -> Self {
        Self {
            config,
            transport: None,
            events: None,
            codec: None,
            retry: None,
            cancel: None,
        }
    }

    /// Use this durable transport instead of connecting to Redis.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn KvTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Override the per-operation retry policy of the durable client.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// External cancellation for the periodic reconciler: it stops once
    /// `true` is sent. [`TieredCache::shutdown`] keeps working as well.
    #[must_use]
    pub fn cancel_signal(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub async fn build(self) -> Result<TieredCache, CacheError> {
        let Self { config, transport, events, codec, retry, cancel } = self;

        config.validate()?;
        let capacity = config.capacity()?;

        let events: Arc<dyn EventSink> = events.unwrap_or_else(|| Arc::new(TracingSink));
        let transport: Arc<dyn KvTransport> = match transport {
            Some(transport) => transport,
            None => Arc::new(RedisTransport::connect_with(config.connection_info()?, events.as_ref()).await?),
        };
        let codec: Arc<dyn PayloadCodec> = codec.unwrap_or_else(|| Arc::new(ZstdCodec::default()));

        let memory = Arc::new(LruStore::new(capacity));
        let durable = Arc::new(
            DurableClient::new(transport, events.clone())
                .with_retry(retry.unwrap_or_else(RetryConfig::durable))
                .with_scan_count(config.scan_count),
        );
        let reconciler = Arc::new(Reconciler::new(memory.clone(), durable.clone(), events.clone()));

        if config.sync_at_start {
            // Failures are reported through the sink; startup carries on cold
            reconciler.run_once(&config.key_pattern).await;
        }

        let handle = config.sync_interval().map(|interval| match cancel {
            Some(signal) => reconciler.spawn_with_signal(interval, config.key_pattern.clone(), signal),
            None => reconciler.spawn_periodic(interval, config.key_pattern.clone()),
        });

        Ok(TieredCache {
            config,
            memory,
            durable,
            codec,
            events,
            reconciler,
            reconcile_handle: Mutex::new(handle),
        })
    }
}

impl TieredCache {
    /// Connect to Redis with the given config and start the cache.
    pub async fn connect(config: TieredCacheConfig) -> Result<Self, CacheError> {
        Self::builder(config).build().await
    }

    #[must_use]
    pub fn builder(config: TieredCacheConfig) -> TieredCacheBuilder {
        TieredCacheBuilder::new(config)
    }

    /// Stop the periodic reconciler and wait for it to exit.
    ///
    /// A sweep in flight runs to completion first. Both tiers stay usable
    /// afterwards; only background refresh ends. Idempotent. A task that
    /// died from a panicking sweep is reported as `ReconcilerCrashed`.
    pub async fn shutdown(&self) {
        let handle = self.reconcile_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.shutdown().await {
                self.events.emit(&CacheEvent::ReconcilerCrashed {
                    pattern: &self.config.key_pattern,
                    error: &e,
                });
            }
        }
    }
}
