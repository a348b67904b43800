//! In-flight operation state and completion tracking

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_queue::SegQueue;
use taskpool_runtime::TaskCounter;

use crate::buffer::SharedBuffer;
use crate::error::ChunkError;
use crate::plan::Chunk;
use crate::report::{ChunkOutcome, IoKind, IoReport};

/// State shared by the chunk tasks of one read or write
pub(crate) struct OpState {
    pub(crate) path: PathBuf,
    pub(crate) kind: IoKind,
    pub(crate) base_offset: u64,
    pub(crate) buffer: SharedBuffer,
    total: usize,
    remaining: TaskCounter,
    outcomes: SegQueue<ChunkOutcome>,
    /// Scheduler-wide outstanding chunk count
    scheduler: Arc<TaskCounter>,
}

impl OpState {
    /// Counters are charged for `chunks` up front so no waiter can observe
    /// zero while tasks are still being dispatched.
    pub(crate) fn new(
        path: PathBuf,
        kind: IoKind,
        base_offset: u64,
        buffer: Vec<u8>,
        chunks: usize,
        scheduler: Arc<TaskCounter>,
    ) -> Arc<Self> {
        let remaining = TaskCounter::new();
        remaining.add(chunks);
        scheduler.add(chunks);
        Arc::new(Self {
            path,
            kind,
            base_offset,
            buffer: SharedBuffer::new(buffer),
            total: chunks,
            remaining,
            outcomes: SegQueue::new(),
            scheduler,
        })
    }

    fn record(&self, outcome: ChunkOutcome) {
        self.outcomes.push(outcome);
        self.remaining.decrement();
        self.scheduler.decrement();
    }
}

/// Obligation to report exactly one outcome for a chunk
///
/// Moved into the chunk's task. If the task is dropped without running
/// (refused by the pool, or discarded by `WorkerPool::join`), the ticket
/// reports the chunk as rejected so waiters are never stranded.
pub(crate) struct ChunkTicket {
    op: Arc<OpState>,
    chunk: Chunk,
    done: bool,
}

impl ChunkTicket {
    pub(crate) fn new(op: Arc<OpState>, chunk: Chunk) -> Self {
        Self {
            op,
            chunk,
            done: false,
        }
    }

    #[inline]
    pub(crate) fn op(&self) -> &OpState {
        &self.op
    }

    #[inline]
    pub(crate) fn chunk(&self) -> Chunk {
        self.chunk
    }

    pub(crate) fn complete(mut self, result: Result<(), ChunkError>) {
        self.done = true;
        self.op.record(ChunkOutcome {
            chunk: self.chunk,
            result,
        });
    }
}

impl Drop for ChunkTicket {
    fn drop(&mut self) {
        if !self.done {
            self.op.record(ChunkOutcome {
                chunk: self.chunk,
                result: Err(ChunkError::rejected("chunk dropped before it ran")),
            });
        }
    }
}

/// Handle to a submitted read or write
pub struct IoHandle {
    op: Arc<OpState>,
}

impl IoHandle {
    pub(crate) fn new(op: Arc<OpState>) -> Self {
        Self { op }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.op.path
    }

    #[inline]
    pub fn kind(&self) -> IoKind {
        self.op.kind
    }

    /// Bytes covered by the operation
    #[inline]
    pub fn len(&self) -> usize {
        self.op.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of chunks the operation was split into
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.op.total
    }

    /// Chunks not finished yet
    #[inline]
    pub fn remaining(&self) -> usize {
        self.op.remaining.get()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.op.remaining.is_zero()
    }

    /// Block until every chunk has finished or `timeout` elapses
    ///
    /// Returns `true` if the operation is done.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.op.remaining.wait_timeout(timeout)
    }

    /// Block until every chunk has finished and collect the result
    pub fn wait(self) -> IoReport {
        self.op.remaining.wait();

        let mut chunks = Vec::with_capacity(self.op.total);
        while let Some(outcome) = self.op.outcomes.pop() {
            chunks.push(outcome);
        }
        chunks.sort_unstable_by_key(|o| o.chunk.index);

        // SAFETY: every chunk has recorded its outcome, and tasks only touch
        // the buffer before recording, so no borrow of it is live.
        let buffer = unsafe { self.op.buffer.take() };

        IoReport {
            path: self.op.path.clone(),
            kind: self.op.kind,
            base_offset: self.op.base_offset,
            chunks,
            buffer,
        }
    }
}

impl fmt::Debug for IoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoHandle")
            .field("path", &self.op.path)
            .field("kind", &self.op.kind)
            .field("chunks", &self.op.total)
            .field("remaining", &self.remaining())
            .finish()
    }
}
