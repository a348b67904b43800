//! Library defaults for [`PoolConfig`](super::PoolConfig)

/// Upper bound on worker threads per pool
pub const MAX_THREADS: usize = 1024;

/// Empty polls a worker spins through before it starts sleeping
pub const IDLE_SPINS: u32 = 100;

/// First idle sleep after the spin budget is used up
pub const BACKOFF_START_US: u64 = 100;

/// Idle sleep cap; sleeps double from the start value up to this
pub const BACKOFF_MAX_US: u64 = 1000;

/// Hardware thread count, falling back to 4 when unknown
pub fn num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(MAX_THREADS)
}
