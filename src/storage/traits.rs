use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Connection error: {0}")]
    Connection(String),
}

/// One page of a cursor-based key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next page. `0` means the iteration is complete.
    pub cursor: u64,
    pub keys: Vec<String>,
}

impl ScanPage {
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Minimal remote key-value protocol the durable tier relies on.
///
/// Mirrors the Redis commands `SET`, `GET`, `DEL`, `INCRBY` and
/// `SCAN cursor MATCH pattern COUNT n`. Any service that can answer these is
/// a valid durable tier. Implementations do a single round trip per call and
/// must not retry; retry policy lives in [`DurableClient`](super::durable::DurableClient).
#[async_trait]
pub trait KvTransport: Send + Sync {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Returns [`StorageError::NotFound`] when the key does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Atomically add `delta` and return the new value.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError>;

    /// Fetch one page of keys matching a glob `pattern`, starting at `cursor`
    /// (`0` starts a new iteration). `count` is a hint, not a limit.
    async fn scan_page(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, StorageError>;
}
