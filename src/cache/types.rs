//! Public error type for the tiered cache.

use thiserror::Error;

use crate::codec::CodecError;
use crate::storage::traits::StorageError;

/// Everything a caller-invoked cache operation can fail with.
///
/// The in-memory tier never fails, so every variant comes from the durable
/// tier, from serialization, or from construction.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Durable tier failed after the retry budget was spent
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A structured read found a non-bytes value in memory
    #[error("type mismatch for '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("failed to encode value for '{key}': {reason}")]
    Encode { key: String, reason: String },

    #[error("failed to decode value for '{key}': {reason}")]
    Decode { key: String, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Rejected at construction
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// True for `StorageError::NotFound` coming through the durable tier.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Storage(StorageError::NotFound(_)))
    }
}
