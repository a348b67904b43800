//! Chunked parallel file scheduler
//!
//! Each `add_write`/`add_read` call does its serial set-up (truncate,
//! create, size probe) on the calling thread, splits the byte range into
//! chunks, and submits one pool task per chunk. Every chunk opens its own
//! file handle and does positioned I/O on its own range, so chunks run in
//! any order on any worker.

use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use taskpool_core::{kdebug, kwarn};
use taskpool_runtime::{TaskCounter, WorkerPool};

use crate::backend::{FileBackend, OsBackend};
use crate::config::FileConfig;
use crate::error::{FileError, FileResult};
use crate::operation::{ChunkTicket, IoHandle, OpState};
use crate::plan::ChunkPlan;
use crate::report::IoKind;

/// Where a write lands in the target file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Create or truncate, then write from offset 0
    #[default]
    Overwrite,
    /// Create if missing, then write after the current end
    Append,
}

/// The pool a scheduler submits to
pub enum PoolSource<'p> {
    /// Created by and shut down with the scheduler
    Owned(WorkerPool),
    /// Supplied by the caller, who keeps it alive
    Borrowed(&'p WorkerPool),
}

impl Deref for PoolSource<'_> {
    type Target = WorkerPool;

    fn deref(&self) -> &WorkerPool {
        match self {
            PoolSource::Owned(pool) => pool,
            PoolSource::Borrowed(pool) => *pool,
        }
    }
}

impl From<WorkerPool> for PoolSource<'static> {
    fn from(pool: WorkerPool) -> Self {
        PoolSource::Owned(pool)
    }
}

impl<'p> From<&'p WorkerPool> for PoolSource<'p> {
    fn from(pool: &'p WorkerPool) -> Self {
        PoolSource::Borrowed(pool)
    }
}

/// Splits reads and writes into chunks and runs them on a worker pool
pub struct FileScheduler<'p, B: FileBackend = OsBackend> {
    pool: PoolSource<'p>,
    backend: Arc<B>,
    chunk_size: usize,
    read_min_block: usize,
    read_parallelism: usize,
    outstanding: Arc<TaskCounter>,
    running: AtomicBool,
}

impl FileScheduler<'static, OsBackend> {
    /// Scheduler with its own pool, both configured from the environment
    ///
    /// # Panics
    ///
    /// If either configuration is invalid or the pool's worker threads
    /// cannot be spawned.
    pub fn new() -> Self {
        Self::with_config(WorkerPool::default(), FileConfig::from_env())
            .expect("invalid file scheduler configuration")
    }
}

impl Default for FileScheduler<'static, OsBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> FileScheduler<'p, OsBackend> {
    /// Scheduler on a caller-owned pool
    pub fn with_pool(pool: &'p WorkerPool) -> FileResult<Self> {
        Self::with_config(pool, FileConfig::from_env())
    }

    pub fn with_config(pool: impl Into<PoolSource<'p>>, config: FileConfig) -> FileResult<Self> {
        Self::with_backend(pool, config, OsBackend)
    }
}

impl<'p, B: FileBackend> FileScheduler<'p, B> {
    /// Fails with [`FileError::InvalidConfig`] if `config` does not validate
    pub fn with_backend(
        pool: impl Into<PoolSource<'p>>,
        config: FileConfig,
        backend: B,
    ) -> FileResult<Self> {
        config.validate()?;

        let chunk_size = config.effective_chunk_size();
        if chunk_size != config.chunk_size {
            kdebug!(
                "chunk size {} raised to floor {}",
                config.chunk_size,
                chunk_size
            );
        }
        Ok(Self {
            pool: pool.into(),
            backend: Arc::new(backend),
            chunk_size,
            read_min_block: config.read_min_block,
            read_parallelism: config.read_parallelism,
            outstanding: Arc::new(TaskCounter::new()),
            running: AtomicBool::new(true),
        })
    }

    /// Effective write chunk size
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Write `buffer` to `path` in parallel chunks
    ///
    /// The buffer is held for the life of the operation and returned by
    /// [`IoHandle::wait`]. Set-up failures are returned here; per-chunk
    /// failures are in the report.
    pub fn add_write(
        &self,
        path: impl AsRef<Path>,
        buffer: Vec<u8>,
        mode: WriteMode,
    ) -> FileResult<IoHandle> {
        self.check_running()?;
        let path = path.as_ref();

        let base_offset = match mode {
            WriteMode::Overwrite => {
                self.backend.truncate(path).map_err(|source| FileError::Prepare {
                    path: path.to_path_buf(),
                    source,
                })?;
                0
            }
            WriteMode::Append => self.backend.ensure(path).map_err(|source| FileError::Prepare {
                path: path.to_path_buf(),
                source,
            })?,
        };

        let plan = ChunkPlan::fixed(buffer.len(), self.chunk_size);
        Ok(self.dispatch(path, IoKind::Write, base_offset, buffer, plan))
    }

    /// Read all of `path` into `buffer` in parallel chunks
    ///
    /// `buffer` is cleared and resized to the file's length; pass a reused
    /// allocation to avoid reallocating. The filled buffer comes back from
    /// [`IoHandle::wait`].
    pub fn add_read(&self, path: impl AsRef<Path>, mut buffer: Vec<u8>) -> FileResult<IoHandle> {
        self.check_running()?;
        let path = path.as_ref();

        let stat = self.backend.stat(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FileError::NotFound(path.to_path_buf())
            } else {
                FileError::Prepare {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        if !stat.is_file {
            return Err(FileError::NotAFile(path.to_path_buf()));
        }
        let len = usize::try_from(stat.len).map_err(|_| FileError::Prepare {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                "file larger than addressable memory",
            ),
        })?;

        buffer.clear();
        buffer.resize(len, 0);

        let plan = ChunkPlan::adaptive(len, self.read_parallelism, self.read_min_block);
        Ok(self.dispatch(path, IoKind::Read, 0, buffer, plan))
    }

    fn check_running(&self) -> FileResult<()> {
        if self.running.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(FileError::Stopped)
        }
    }

    fn dispatch(
        &self,
        path: &Path,
        kind: IoKind,
        base_offset: u64,
        buffer: Vec<u8>,
        plan: ChunkPlan,
    ) -> IoHandle {
        let chunks = plan.into_chunks();
        kdebug!(
            "{} {} bytes of {} in {} chunks at offset {}",
            kind,
            buffer.len(),
            path.display(),
            chunks.len(),
            base_offset
        );

        let op = OpState::new(
            path.to_path_buf(),
            kind,
            base_offset,
            buffer,
            chunks.len(),
            Arc::clone(&self.outstanding),
        );

        let mut refused = 0usize;
        for chunk in chunks {
            let ticket = ChunkTicket::new(Arc::clone(&op), chunk);
            let backend = Arc::clone(&self.backend);
            // A refused closure is dropped inside `insert`, and its ticket
            // records the chunk as rejected.
            if !self.pool.insert(move || run_chunk(&*backend, ticket)) {
                refused += 1;
            }
        }
        if refused > 0 {
            kwarn!(
                "pool refused {} chunks of {} {}",
                refused,
                kind,
                path.display()
            );
        }

        IoHandle::new(op)
    }

    /// Chunks submitted by this scheduler that have not finished
    #[inline]
    pub fn get_task_count(&self) -> usize {
        self.outstanding.get()
    }

    /// Refuse further submissions
    ///
    /// Chunks already submitted still run to completion.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            kdebug!(
                "file scheduler stopped with {} chunks outstanding",
                self.get_task_count()
            );
        }
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        !self.running.load(Ordering::Acquire)
    }

    /// Block until every chunk submitted so far has finished
    ///
    /// # Panics
    ///
    /// If called from a worker of the scheduler's pool.
    pub fn wait(&self) {
        assert!(
            !self.pool.is_worker_thread(),
            "FileScheduler::wait called from a worker of its own pool"
        );
        self.outstanding.wait();
    }
}

fn run_chunk<B: FileBackend>(backend: &B, ticket: ChunkTicket) {
    let op = ticket.op();
    let chunk = ticket.chunk();
    let result = match op.kind {
        IoKind::Write => {
            // SAFETY: chunks of one operation cover disjoint ranges.
            let data = unsafe { op.buffer.slice(chunk.offset, chunk.len) };
            backend.write_at(&op.path, op.base_offset + chunk.offset as u64, data)
        }
        IoKind::Read => {
            // SAFETY: as above.
            let buf = unsafe { op.buffer.slice_mut(chunk.offset, chunk.len) };
            backend.read_at(&op.path, op.base_offset + chunk.offset as u64, buf)
        }
    };
    if let Err(e) = &result {
        kwarn!(
            "{} chunk {} of {} failed: {}",
            op.kind,
            chunk.index,
            op.path.display(),
            e
        );
    }
    ticket.complete(result);
}

impl<B: FileBackend> Drop for FileScheduler<'_, B> {
    fn drop(&mut self) {
        self.stop();
        if self.pool.is_worker_thread() {
            kwarn!("FileScheduler dropped on its own pool's worker; not waiting");
            return;
        }
        self.outstanding.wait();
    }
}
