//! # Pipeline Workers
//!
//! Producer and consumer tasks. Each worker owns its own random delay source, its queue
//! handle and an [`ActivityGuard`](crate::metrics::ActivityGuard) taken at construction,
//! so the active counters are raised before the task is spawned and lowered on every
//! exit path.

pub mod consumer;
pub mod delay;
pub mod producer;

pub use consumer::{Consumer, MessageHandler, NoopHandler};
pub use delay::DelaySampler;
pub use producer::Producer;
