//! Redis transport for the durable tier.
//!
//! Values are stored as plain Redis STRINGs, so other processes (and
//! `redis-cli`) can read and write them directly. Reconciliation relies on
//! that: keys written by anyone show up on the next sweep.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ConnectionInfo, IntoConnectionInfo, RedisError};

use super::traits::{KvTransport, ScanPage, StorageError};
use crate::events::EventSink;
use crate::resilience::retry::{retry, RetryConfig};

pub struct RedisTransport {
    connection: ConnectionManager,
}

impl RedisTransport {
    /// Connect to `connection_string` (e.g. `redis://:secret@localhost:6379/2`).
    ///
    /// The initial connection uses [`RetryConfig::startup()`] so a bad address
    /// fails within a couple of seconds instead of hanging.
    ///
    /// ```rust,no_run
    /// # use tiered_cache::storage::redis::RedisTransport;
    /// # use tiered_cache::events::TracingSink;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let transport = RedisTransport::connect("redis://localhost:6379", &TracingSink).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(connection_string: &str, events: &dyn EventSink) -> Result<Self, StorageError> {
        let info = connection_string
            .into_connection_info()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::connect_with(info, events).await
    }

    /// Connect using already-split connection parameters.
    ///
    /// Credentials travel as separate fields, so passwords never go through
    /// URL parsing.
    pub async fn connect_with(info: ConnectionInfo, events: &dyn EventSink) -> Result<Self, StorageError> {
        let client = Client::open(info).map_err(|e| StorageError::Connection(e.to_string()))?;

        let connection = retry("redis_connect", &RetryConfig::startup(), events, || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self { connection })
    }

    /// Get a clone of the connection manager
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn map_err(e: RedisError) -> StorageError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        StorageError::Connection(e.to_string())
    } else {
        StorageError::Backend(e.to_string())
    }
}

#[async_trait]
impl KvTransport for RedisTransport {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(key, value).await.map_err(map_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut conn = self.connection.clone();
        let data: Option<Vec<u8>> = conn.get(key).await.map_err(map_err)?;
        data.ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await.map_err(map_err)?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        let mut conn = self.connection.clone();
        // INCRBY key delta
        conn.incr(key, delta).await.map_err(map_err)
    }

    async fn scan_page(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, StorageError> {
        let mut conn = self.connection.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(ScanPage { cursor, keys })
    }
}
