//! # taskpool - Worker pool with chunked parallel file I/O
//!
//! A fixed set of OS worker threads fed from a lock-free MPMC queue, plus a
//! scheduler that splits file reads and writes into chunks run on that pool.
//!
//! ## Features
//!
//! - **Lock-free queue**: Michael-Scott MPMC queue with epoch-based reclamation
//! - **Worker pool**: Spin-then-backoff idling, drain (`wait`) or discard (`join`) shutdown
//! - **Chunked file I/O**: Positioned per-chunk reads and writes with per-chunk outcomes
//! - **Ownership box**: Reentrant single-owner container keyed by thread
//!
//! ## Quick Start
//!
//! ```ignore
//! use taskpool::{FileConfig, FileScheduler, WorkerPool, WriteMode};
//!
//! fn main() {
//!     let pool = WorkerPool::new(4);
//!     for i in 0..10 {
//!         pool.insert(move || println!("task {}", i));
//!     }
//!
//!     let files = FileScheduler::with_config(&pool, FileConfig::from_env()).unwrap();
//!     let handle = files
//!         .add_write("/tmp/out.bin", vec![0u8; 64 << 20], WriteMode::Overwrite)
//!         .unwrap();
//!     let report = handle.wait();
//!     assert!(report.is_ok());
//!
//!     drop(files);
//!     pool.wait();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     FileScheduler                        │
//! │     add_write / add_read -> ChunkPlan -> chunk tasks     │
//! └──────────────────────────────────────────────────────────┘
//!                              │ insert
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                      WorkerPool                          │
//! │        admission gate, pending counter, shutdown         │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                    LockFreeQueue<Task>                   │
//! └──────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker   │      │  Worker   │      │  Worker   │
//!    │  Thread   │      │  Thread   │      │  Thread   │
//!    └───────────┘      └───────────┘      └───────────┘
//! ```

// Re-export core types
pub use taskpool_core::{
    LockFreeQueue,
    OwnerBox,
    OwnerGuard,
    OwnerToken,
    ProcessClock,
    Stamp,
};
pub use taskpool_core::constants;

// Re-export kprint macros for logging
pub use taskpool_core::{kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use taskpool_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use taskpool_core::{env_get, env_get_bool, env_get_opt, env_get_size, env_is_set};

// Re-export runtime types
pub use taskpool_runtime::{
    current_worker,
    PoolConfig,
    PoolError,
    PoolResult,
    PoolStats,
    Task,
    TaskCounter,
    WorkerId,
    WorkerPool,
};

// Re-export file I/O types
pub use taskpool_fio::{
    ChunkError,
    ChunkOutcome,
    ChunkStage,
    FileBackend,
    FileConfig,
    FileError,
    FileResult,
    FileScheduler,
    IoHandle,
    IoKind,
    IoReport,
    OsBackend,
    PoolSource,
    WriteMode,
    MIN_CHUNK_SIZE,
};

/// Whether the calling thread is a worker of any pool
#[inline]
pub fn in_worker() -> bool {
    current_worker().is_some()
}
