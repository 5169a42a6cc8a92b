//! Compression codec for structured payloads.
//!
//! `set_structured` / `get_structured` push their JSON through a
//! [`PayloadCodec`] before it reaches the durable tier. The default is zstd
//! with magic-bytes detection, so payloads written uncompressed by an older
//! writer still decode.
//!
//! # Example
//!
//! ```
//! use tiered_cache::codec::{PayloadCodec, ZstdCodec};
//!
//! let codec = ZstdCodec::default();
//! let packed = codec.encode(br#"{"operations":[1,2,3,4,5]}"#).unwrap();
//! assert_eq!(codec.decode(&packed).unwrap(), br#"{"operations":[1,2,3,4,5]}"#);
//! ```

/// Zstd magic bytes (little-endian): 0xFD2FB528
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Default compression level (3 is a good balance of speed/ratio)
const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Compression error types
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to compress data
    #[error("compression failed: {0}")]
    CompressFailed(String),

    /// Failed to decompress data
    #[error("decompression failed: {0}")]
    DecompressFailed(String),
}

/// Opaque byte transform satisfying `decode(encode(x)) == x`.
pub trait PayloadCodec: Send + Sync {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Check if data is zstd-compressed by checking magic bytes.
#[inline]
#[must_use]
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// Custom compression level (1-22).
    ///
    /// - Level 1-3: Fast, good for real-time
    /// - Level 10-15: Balanced
    /// - Level 19-22: Maximum compression, slow
    #[must_use]
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::with_level(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl PayloadCodec for ZstdCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, self.level)
            .map_err(|e| CodecError::CompressFailed(e.to_string()))
    }

    /// Returns the input unchanged if it is not zstd-framed.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if is_compressed(data) {
            zstd::decode_all(data)
                .map_err(|e| CodecError::DecompressFailed(e.to_string()))
        } else {
            Ok(data.to_vec())
        }
    }
}
