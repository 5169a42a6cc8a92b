//! In-process tier storage.
//!
//! [`lru::LruStore`] is the bounded eviction store the cache fronts the
//! durable tier with. It knows nothing about the remote tier: callers decide
//! what to do with the entries it evicts.

pub mod lru;
