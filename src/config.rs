//! Configuration for the tiered cache.
//!
//! # Example
//!
//! ```
//! use tiered_cache::TieredCacheConfig;
//!
//! // Minimal config (uses defaults)
//! let config = TieredCacheConfig::default();
//! assert_eq!(config.memory_capacity, 10_000);
//!
//! // Full config
//! let config = TieredCacheConfig {
//!     redis_addr: "cache.internal:6379".into(),
//!     redis_password: Some("s3cret".into()),
//!     redis_db: 2,
//!     memory_capacity: 50_000,
//!     sync_at_start: true,
//!     sync_interval_ms: 30_000,
//!     key_pattern: "session:*".into(),
//!     ..Default::default()
//! };
//! let info = config.connection_info().unwrap();
//! assert_eq!(info.redis.db, 2);
//! assert_eq!(info.redis.password.as_deref(), Some("s3cret"));
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use serde::Deserialize;

use crate::cache::CacheError;

/// Configuration for the tiered cache.
///
/// Every field has a default, so it can be deserialized from a partial
/// document (TOML, JSON, env-derived maps, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct TieredCacheConfig {
    /// Redis host:port
    #[serde(default = "default_redis_addr")]
    pub redis_addr: String,

    /// Redis AUTH password
    #[serde(default)]
    pub redis_password: Option<String>,

    /// Logical database selector
    #[serde(default)]
    pub redis_db: i64,

    /// Full connection string; overrides addr/password/db when set
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Max entries in the in-process LRU (must be > 0)
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Run one reconciliation sweep before the cache is handed out
    #[serde(default)]
    pub sync_at_start: bool,

    /// Periodic reconciliation interval in milliseconds (0 = disabled)
    #[serde(default)]
    pub sync_interval_ms: u64,

    /// Glob pattern for keys pulled in by reconciliation
    #[serde(default = "default_key_pattern")]
    pub key_pattern: String,

    /// SCAN COUNT hint per page
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

fn default_redis_addr() -> String { "127.0.0.1:6379".to_string() }
fn default_memory_capacity() -> usize { 10_000 }
fn default_key_pattern() -> String { "*".to_string() }
fn default_scan_count() -> usize { 100 }

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            redis_addr: default_redis_addr(),
            redis_password: None,
            redis_db: 0,
            redis_url: None,
            memory_capacity: default_memory_capacity(),
            sync_at_start: false,
            sync_interval_ms: 0,
            key_pattern: default_key_pattern(),
            scan_count: default_scan_count(),
        }
    }
}

impl TieredCacheConfig {
    /// Reject settings the cache cannot run with.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.memory_capacity == 0 {
            return Err(CacheError::Config("memory_capacity must be greater than 0".into()));
        }
        if self.scan_count == 0 {
            return Err(CacheError::Config("scan_count must be greater than 0".into()));
        }
        if self.key_pattern.is_empty() {
            return Err(CacheError::Config("key_pattern must not be empty".into()));
        }
        Ok(())
    }

    /// Validated LRU capacity.
    pub fn capacity(&self) -> Result<NonZeroUsize, CacheError> {
        NonZeroUsize::new(self.memory_capacity)
            .ok_or_else(|| CacheError::Config("memory_capacity must be greater than 0".into()))
    }

    /// Periodic sweep interval, `None` when disabled.
    #[must_use]
    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_ms > 0).then(|| Duration::from_millis(self.sync_interval_ms))
    }

    /// Connection parameters for the durable tier.
    ///
    /// `redis_url` is parsed when set. Otherwise addr, password and db are
    /// passed as separate fields, so the password is used byte for byte.
    pub fn connection_info(&self) -> Result<ConnectionInfo, CacheError> {
        if let Some(ref url) = self.redis_url {
            return url
                .as_str()
                .into_connection_info()
                .map_err(|e| CacheError::Config(format!("invalid redis_url: {}", e)));
        }

        let (host, port) = split_host_port(&self.redis_addr)?;
        let password = self.redis_password.clone().filter(|pw| !pw.is_empty());
        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: self.redis_db,
                password,
                ..Default::default()
            },
        })
    }
}

const DEFAULT_REDIS_PORT: u16 = 6379;

/// `host:port`, `host`, or `[v6]:port`.
fn split_host_port(addr: &str) -> Result<(String, u16), CacheError> {
    let bad = || CacheError::Config(format!("invalid redis_addr: {:?}", addr));

    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(bad)?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p.parse().map_err(|_| bad())?,
            None if tail.is_empty() => DEFAULT_REDIS_PORT,
            None => return Err(bad()),
        };
        return Ok((host.to_string(), port));
    }

    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.contains(':') => {
            Ok((host.to_string(), port.parse().map_err(|_| bad())?))
        }
        None if !addr.is_empty() => Ok((addr.to_string(), DEFAULT_REDIS_PORT)),
        _ => Err(bad()),
    }
}
