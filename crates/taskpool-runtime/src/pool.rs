//! Fixed-size worker pool
//!
//! Spawns N OS threads at creation. Workers pop boxed closures from a
//! lock-free MPMC queue and run them to completion. No dynamic scaling.
//!
//! # Lifecycle
//!
//! ```text
//!   Running ──wait()──▶ Draining ──▶ joined
//!      │                              ▲
//!      └──────join()──▶ Aborting ─────┘ (queued tasks discarded)
//! ```
//!
//! Submission goes through an admission gate: `insert` registers itself as
//! an in-progress submitter before checking the `accepting` flag, and
//! shutdown clears the flag and then waits for in-progress submitters to
//! finish. Once shutdown starts, every accepted task is already in the queue,
//! so `true` from `insert` means the task runs unless `join()` discards it,
//! and `join()` reports how many it discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_utils::Backoff;
use taskpool_core::{kdebug, kerror, kwarn, LockFreeQueue};

use crate::config::PoolConfig;
use crate::counter::TaskCounter;
use crate::error::{PoolError, PoolResult};
use crate::worker::{current_worker, worker_loop};

/// A unit of work: no arguments, no result
pub type Task = Box<dyn FnOnce() + Send + 'static>;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownMode {
    Running = 0,
    /// Run what is queued, then exit
    Draining = 1,
    /// Exit without starting anything else
    Aborting = 2,
}

impl ShutdownMode {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ShutdownMode::Running,
            1 => ShutdownMode::Draining,
            _ => ShutdownMode::Aborting,
        }
    }
}

/// Counters accumulated over the pool's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks run to completion
    pub executed: u64,
    /// `insert` calls refused because shutdown had started
    pub rejected: u64,
    /// Accepted tasks dropped unrun by `join()`
    pub discarded: u64,
}

/// State shared between the pool handle and its workers.
pub(crate) struct PoolShared {
    pub(crate) id: u64,
    pub(crate) queue: LockFreeQueue<Task>,
    /// Tasks currently executing.
    pub(crate) in_flight: AtomicUsize,
    /// Queued + executing.
    pending: TaskCounter,
    accepting: AtomicBool,
    submitting: AtomicUsize,
    mode: AtomicU8,
    executed: AtomicU64,
    rejected: AtomicU64,
    discarded: AtomicU64,
}

impl PoolShared {
    fn new() -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            queue: LockFreeQueue::new(),
            in_flight: AtomicUsize::new(0),
            pending: TaskCounter::new(),
            accepting: AtomicBool::new(true),
            submitting: AtomicUsize::new(0),
            mode: AtomicU8::new(ShutdownMode::Running as u8),
            executed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn mode(&self) -> ShutdownMode {
        ShutdownMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Raise the mode; never moves Aborting back to Draining.
    fn escalate(&self, to: ShutdownMode) {
        self.mode.fetch_max(to as u8, Ordering::AcqRel);
    }

    /// Called by a worker after a task returns.
    #[inline]
    pub(crate) fn finish_task(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.pending.decrement();
    }

    /// Stop admitting tasks and wait out in-progress submitters.
    fn close_gate(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let backoff = Backoff::new();
        while self.submitting.load(Ordering::SeqCst) != 0 {
            backoff.snooze();
        }
    }
}

/// Pool of worker threads executing [`Task`]s
///
/// Dropping the pool performs [`wait`](WorkerPool::wait).
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl WorkerPool {
    /// Create a pool with `n` workers (at least one)
    ///
    /// Other settings come from [`PoolConfig::from_env`].
    ///
    /// # Panics
    ///
    /// If a worker thread cannot be spawned.
    pub fn new(n: usize) -> Self {
        Self::with_config(PoolConfig::from_env().num_threads(n.max(1)))
            .expect("failed to spawn worker thread")
    }

    /// Create a pool from an explicit configuration
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let shared = Arc::new(PoolShared::new());
        let mut handles = Vec::with_capacity(config.num_threads);

        for index in 0..config.num_threads {
            let worker_shared = Arc::clone(&shared);
            let worker_config = config.clone();
            let spawned = thread::Builder::new()
                .name(format!("taskpool-worker-{}", index))
                .spawn(move || worker_loop(worker_shared, index, worker_config));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    kerror!("spawning worker {} of pool {} failed: {}", index, shared.id, e);
                    shared.close_gate();
                    shared.escalate(ShutdownMode::Aborting);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        kdebug!("pool {} started with {} workers", shared.id, config.num_threads);
        Ok(Self {
            shared,
            handles: Mutex::new(handles),
            num_threads: config.num_threads,
        })
    }

    /// Submit a closure for execution
    ///
    /// Returns `false`, without queueing, once shutdown has begun.
    pub fn insert<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = &*self.shared;
        shared.submitting.fetch_add(1, Ordering::SeqCst);
        if !shared.accepting.load(Ordering::SeqCst) {
            shared.submitting.fetch_sub(1, Ordering::SeqCst);
            shared.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        shared.pending.increment();
        shared.queue.push(Box::new(f));
        shared.submitting.fetch_sub(1, Ordering::SeqCst);
        true
    }

    /// Approximate number of queued (not yet started) tasks
    #[inline]
    pub fn task_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Number of worker threads spawned at construction
    #[inline]
    pub fn thread_count(&self) -> usize {
        self.num_threads
    }

    /// Tasks currently executing
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Accepted tasks that have not finished yet (queued + executing)
    #[inline]
    pub fn pending(&self) -> usize {
        self.shared.pending.get()
    }

    /// Whether shutdown has begun (`insert` now returns `false`)
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        !self.shared.accepting.load(Ordering::Acquire)
    }

    /// Whether the calling thread is one of this pool's workers
    #[inline]
    pub fn is_worker_thread(&self) -> bool {
        current_worker().is_some_and(|w| w.pool == self.shared.id)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            executed: self.shared.executed.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
        }
    }

    /// Run everything submitted so far, then shut down and join the workers
    ///
    /// Blocks until nothing is queued or executing. Tasks admitted while
    /// shutdown is starting still run. One-shot: the pool refuses work
    /// afterwards and further calls return immediately.
    ///
    /// # Panics
    ///
    /// If called from one of this pool's own workers (it would wait on
    /// itself forever).
    pub fn wait(&self) {
        assert!(
            !self.is_worker_thread(),
            "WorkerPool::wait called from a worker of the same pool"
        );
        self.shared.pending.wait();
        self.shared.close_gate();
        self.shared.escalate(ShutdownMode::Draining);
        self.join_workers();
    }

    /// Shut down now, discarding queued tasks
    ///
    /// Running tasks finish; queued tasks are dropped without running.
    /// Returns the number of tasks discarded.
    ///
    /// # Panics
    ///
    /// If called from one of this pool's own workers.
    pub fn join(&self) -> usize {
        assert!(
            !self.is_worker_thread(),
            "WorkerPool::join called from a worker of the same pool"
        );
        self.shared.close_gate();
        self.shared.escalate(ShutdownMode::Aborting);
        self.join_workers();

        let mut discarded = 0;
        while let Some(task) = self.shared.queue.pop() {
            drop(task);
            discarded += 1;
        }
        if discarded > 0 {
            self.shared.pending.sub(discarded);
            self.shared
                .discarded
                .fetch_add(discarded as u64, Ordering::Relaxed);
            kwarn!("pool {} discarded {} queued tasks on join", self.shared.id, discarded);
        }
        discarded
    }

    fn join_workers(&self) {
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if handle.join().is_err() {
                kerror!("a worker of pool {} terminated abnormally", self.shared.id);
            }
        }
        kdebug!("pool {} joined ({:?})", self.shared.id, self.stats());
    }
}

impl Default for WorkerPool {
    /// Pool built from [`PoolConfig::from_env`]
    ///
    /// # Panics
    ///
    /// If the configuration is invalid or a worker thread cannot be spawned.
    fn default() -> Self {
        Self::with_config(PoolConfig::from_env()).expect("failed to start default worker pool")
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.is_worker_thread() {
            // Dropped from inside its own task; waiting would deadlock.
            self.shared.close_gate();
            self.shared.escalate(ShutdownMode::Draining);
            return;
        }
        self.wait();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.id)
            .field("threads", &self.num_threads)
            .field("queued", &self.task_count())
            .field("in_flight", &self.in_flight())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
