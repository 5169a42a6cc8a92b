//! Durable-tier storage: the remote protocol seam, its backends, and the
//! retrying client the cache talks to.

pub mod traits;
pub mod redis;
pub mod memory;
pub mod durable;
#[cfg(any(test, feature = "test-utils"))]
pub mod fault;
