//! Basic taskpool example
//!
//! Runs a batch of tasks on a small pool and shares a counter between them
//! through an `OwnerBox`.
//!
//! # Environment Variables
//!
//! - `TASKPOOL_FLUSH_EPRINT=1` - Flush log output immediately
//! - `TASKPOOL_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `TASKPOOL_THREADS=<n>` - Worker count

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use taskpool::{current_worker, kdebug, kinfo, OwnerBox, PoolConfig, ProcessClock, WorkerPool};

// TASKPOOL_LOG_LEVEL=debug cargo run -p taskpool-basic
fn main() {
    let clock = ProcessClock::start();
    taskpool::init_logging();
    println!("=== taskpool Basic Example ===\n");

    let config = PoolConfig::from_env();
    config.print();
    let pool = match WorkerPool::with_config(config) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to start pool: {}", e);
            std::process::exit(1);
        }
    };

    let completed = Arc::new(AtomicUsize::new(0));
    let tally = Arc::new(OwnerBox::new(Cell::new(0u64)));
    let contended = Arc::new(AtomicUsize::new(0));

    let tasks = 1000;
    kinfo!("submitting {} tasks", tasks);
    for i in 0..tasks {
        let completed = Arc::clone(&completed);
        let tally = Arc::clone(&tally);
        let contended = Arc::clone(&contended);
        pool.insert(move || {
            match tally.get() {
                Some(guard) => guard.set(guard.get() + i as u64),
                None => {
                    contended.fetch_add(1, Ordering::Relaxed);
                }
            }
            if i % 250 == 0 {
                kdebug!("[task {}] on {:?}", i, current_worker());
            }
            completed.fetch_add(1, Ordering::Relaxed);
        });
    }

    pool.wait();

    let stats = pool.stats();
    println!("Completed:  {}", completed.load(Ordering::Relaxed));
    println!("Executed:   {}", stats.executed);
    println!("Contended:  {}", contended.load(Ordering::Relaxed));
    if let Some(guard) = tally.get() {
        println!("Tally:      {}", guard.get());
    }
    println!("Elapsed:    {}", clock.stamp());

    println!("\n=== Example Complete ===");
}
