//! Worker thread loop
//!
//! Each worker pops tasks from the pool's shared queue. When the queue is
//! empty it spins through a fixed budget of polls, then sleeps with
//! exponential backoff. Any successful pop resets it to the spin phase.

use std::cell::Cell;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskpool_core::{kdebug, kerror, ktrace};

use crate::config::PoolConfig;
use crate::pool::{PoolShared, ShutdownMode};

/// Spin-then-sleep idle policy
///
/// With the defaults: 100 immediate retries, then sleeps of 100, 200, 400,
/// 800 us, then 1 ms for every further empty poll.
#[derive(Debug, Clone)]
pub struct IdleBackoff {
    spin_budget: u32,
    spins_left: u32,
    start: Duration,
    max: Duration,
    delay: Duration,
}

impl IdleBackoff {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            spin_budget: config.idle_spins,
            spins_left: config.idle_spins,
            start: config.backoff_start,
            max: config.backoff_max,
            delay: config.backoff_start,
        }
    }

    /// Back to the spin phase (after a successful pop)
    #[inline]
    pub fn reset(&mut self) {
        self.spins_left = self.spin_budget;
        self.delay = self.start;
    }

    /// Next idle step: `None` to retry at once, `Some(d)` to sleep for `d`
    #[inline]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.spins_left > 0 {
            self.spins_left -= 1;
            return None;
        }
        let delay = self.delay;
        self.delay = (self.delay * 2).min(self.max);
        Some(delay)
    }

    /// Perform one idle step
    #[inline]
    pub fn idle(&mut self) {
        match self.next_delay() {
            None => std::hint::spin_loop(),
            Some(d) => thread::sleep(d),
        }
    }
}

/// Identity of the pool worker running on this thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerId {
    pub pool: u64,
    pub index: usize,
}

thread_local! {
    static CURRENT_WORKER: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

/// The pool worker running on this thread, if any
#[inline]
pub fn current_worker() -> Option<WorkerId> {
    CURRENT_WORKER.with(|cell| cell.get())
}

/// Aborts the process if a task unwinds through it.
///
/// Task panics are programmer errors; letting one kill a worker silently
/// would leave the pending count stuck and every `wait` hung.
struct AbortOnPanic {
    worker: WorkerId,
}

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            kerror!(
                "task panicked on worker {} of pool {}; aborting",
                self.worker.index,
                self.worker.pool
            );
            std::process::abort();
        }
    }
}

/// Worker thread main loop.
pub(crate) fn worker_loop(shared: Arc<PoolShared>, index: usize, config: PoolConfig) {
    let me = WorkerId {
        pool: shared.id,
        index,
    };
    CURRENT_WORKER.with(|cell| cell.set(Some(me)));
    kdebug!("worker {} of pool {} started", index, shared.id);

    let mut idle = IdleBackoff::new(&config);
    let mut executed = 0u64;

    loop {
        if shared.mode() == ShutdownMode::Aborting {
            break;
        }

        if let Some(task) = shared.queue.pop() {
            shared.in_flight.fetch_add(1, Ordering::AcqRel);
            let guard = AbortOnPanic { worker: me };
            task();
            std::mem::forget(guard);
            shared.finish_task();
            executed += 1;
            idle.reset();
            continue;
        }

        if shared.mode() == ShutdownMode::Draining {
            break;
        }

        idle.idle();
    }

    CURRENT_WORKER.with(|cell| cell.set(None));
    ktrace!("worker {} of pool {} exiting after {} tasks", index, shared.id, executed);
}
