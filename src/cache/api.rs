//! Read/write operations on the tiered cache.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::events::CacheEvent;
use crate::reconcile::SweepReport;
use crate::value::CacheValue;

use super::{CacheError, TieredCache};

impl TieredCache {
    /// Write-through set.
    ///
    /// The memory tier is updated first and unconditionally. The value is then
    /// encoded and written to the durable tier. A durable failure is returned
    /// but the memory write stays in place: after an `Err` the memory tier
    /// already reflects the new value and the durable tier does not.
    pub async fn set(&self, key: &str, value: impl Into<CacheValue>) -> Result<(), CacheError> {
        let value = value.into();
        let encoded = value.encode();
        self.remember(key, value);

        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                self.events.emit(&CacheEvent::EncodeFailed { key, error: &e });
                return Err(CacheError::Encode {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        match self.durable.set(key, &bytes).await {
            Ok(()) => {
                self.events.emit(&CacheEvent::DurableWrite { key, bytes: bytes.len() });
                Ok(())
            }
            Err(e) => {
                self.events.emit(&CacheEvent::DurableWriteFailed { key, error: &e });
                Err(e.into())
            }
        }
    }

    /// Read-through get.
    ///
    /// A memory hit returns without network I/O and promotes the key. A miss
    /// fetches from the durable tier, stores the raw bytes in memory and
    /// returns them as [`CacheValue::Bytes`].
    pub async fn get(&self, key: &str) -> Result<CacheValue, CacheError> {
        if let Some(value) = self.memory.get(key) {
            self.events.emit(&CacheEvent::MemoryHit { key });
            return Ok(value);
        }
        self.events.emit(&CacheEvent::MemoryMiss { key });

        match self.durable.get(key).await {
            Ok(raw) => {
                self.events.emit(&CacheEvent::FilledFromDurable { key, bytes: raw.len() });
                let value = CacheValue::Bytes(raw);
                self.remember(key, value.clone());
                Ok(value)
            }
            Err(e) => {
                self.events.emit(&CacheEvent::DurableReadFailed { key, error: &e });
                Err(e.into())
            }
        }
    }

    /// [`get`](Self::get), normalized to the durable byte form.
    pub async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let value = self.get(key).await?;
        value.encode().map_err(|e| CacheError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Atomic increment arbitrated by the durable tier.
    ///
    /// Never reads the memory copy. The new value is mirrored into memory as
    /// [`CacheValue::Int`] only after the durable increment succeeded.
    ///
    /// The increment is retried like every durable call, so a failure after
    /// the server applied it can apply the delta more than once.
    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let value = self.durable.incr_by(key, delta).await?;
        self.remember(key, CacheValue::Int(value));
        self.events.emit(&CacheEvent::Incremented { key, value });
        Ok(value)
    }

    /// Remove from memory, then from the durable tier.
    ///
    /// The memory copy is gone even when the durable delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.memory.delete(key);
        crate::metrics::set_memory_items(self.memory.len());

        match self.durable.delete(key).await {
            Ok(()) => {
                self.events.emit(&CacheEvent::Deleted { key });
                Ok(())
            }
            Err(e) => {
                self.events.emit(&CacheEvent::DeleteFailed { key, error: &e });
                Err(e.into())
            }
        }
    }

    /// Serialize to JSON, compress, and [`set`](Self::set) as bytes.
    pub async fn set_structured<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let json = match serde_json::to_vec(value) {
            Ok(json) => json,
            Err(e) => {
                self.events.emit(&CacheEvent::EncodeFailed { key, error: &e });
                return Err(CacheError::Encode {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let packed = self.codec.encode(&json)?;
        self.set(key, CacheValue::Bytes(packed)).await
    }

    /// Reverse of [`set_structured`](Self::set_structured).
    ///
    /// Fails with [`CacheError::TypeMismatch`] when the memory tier holds a
    /// value that was not stored as bytes.
    pub async fn get_structured<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: DeserializeOwned,
    {
        let packed = match self.get(key).await? {
            CacheValue::Bytes(packed) => packed,
            other => {
                return Err(CacheError::TypeMismatch {
                    key: key.to_string(),
                    expected: "bytes",
                    found: other.kind(),
                })
            }
        };
        let json = self.codec.decode(&packed)?;
        serde_json::from_slice(&json).map_err(|e| CacheError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Run one reconciliation sweep now, independent of the periodic task.
    pub async fn sync_now(&self, pattern: &str) -> SweepReport {
        self.reconciler.run_once(pattern).await
    }
}
