//! # taskpool-runtime
//!
//! Worker pool for the taskpool engine.
//!
//! This crate provides:
//! - `WorkerPool`: fixed OS worker threads fed by a lock-free queue
//! - Spin-then-backoff idling for workers with no work
//! - `TaskCounter`: outstanding-work counter with blocking wait
//! - `PoolConfig`: defaults with `TASKPOOL_*` environment overrides

pub mod config;
pub mod counter;
pub mod error;
pub mod pool;
pub mod worker;

// Re-exports
pub use config::PoolConfig;
pub use counter::TaskCounter;
pub use error::{PoolError, PoolResult};
pub use pool::{PoolStats, Task, WorkerPool};
pub use worker::{current_worker, IdleBackoff, WorkerId};
