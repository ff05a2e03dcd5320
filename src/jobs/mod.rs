//! Job handlers — one module per family of job types.
//!
//! Handlers hold no state of their own; everything comes in through
//! [`HandlerDeps`](crate::dispatch::HandlerDeps).

pub mod device_tokens;
pub mod export;
pub mod maintenance;
pub mod mark_read;
