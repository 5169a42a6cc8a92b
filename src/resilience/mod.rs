//! Resilience primitives for talking to the durable tier.

pub mod retry;
