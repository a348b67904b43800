//! # taskpool-fio
//!
//! Chunked parallel file reads and writes on a [`WorkerPool`](taskpool_runtime::WorkerPool).
//!
//! ## Modules
//!
//! - `scheduler` - Submission, stop and wait
//! - `plan` - Splitting a byte range into chunks
//! - `backend` - Positioned file access (pread/pwrite on unix)
//! - `report` - Per-chunk outcomes of a finished operation
//! - `config` - Chunk sizing from env vars
//! - `error` - Error types

pub mod backend;
pub mod config;
pub mod error;
pub mod plan;
pub mod report;
pub mod scheduler;

mod buffer;
mod operation;

pub use backend::{FileBackend, FileStat, OsBackend};
pub use config::{FileConfig, MIN_CHUNK_SIZE};
pub use error::{ChunkError, ChunkStage, FileError, FileResult};
pub use operation::IoHandle;
pub use plan::{Chunk, ChunkPlan};
pub use report::{ChunkOutcome, IoKind, IoReport};
pub use scheduler::{FileScheduler, PoolSource, WriteMode};
