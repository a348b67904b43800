//! Stress test - many tasks, many submitters
//!
//! Usage: `stress [tasks] [submitters]`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use taskpool::{LockFreeQueue, PoolConfig, WorkerPool};

fn queue_round(producers: usize, per_producer: usize) {
    let queue = Arc::new(LockFreeQueue::new());
    let popped = Arc::new(AtomicU64::new(0));
    let sum = Arc::new(AtomicU64::new(0));
    let total = (producers * per_producer) as u64;
    if total == 0 {
        return;
    }
    let start = Instant::now();

    let mut handles = Vec::new();
    for p in 0..producers {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                queue.push((p * per_producer + i) as u64);
            }
        }));
    }
    for _ in 0..producers {
        let queue = Arc::clone(&queue);
        let popped = Arc::clone(&popped);
        let sum = Arc::clone(&sum);
        handles.push(thread::spawn(move || {
            while popped.load(Ordering::Relaxed) < total {
                if let Some(v) = queue.pop() {
                    sum.fetch_add(v, Ordering::Relaxed);
                    popped.fetch_add(1, Ordering::Relaxed);
                } else {
                    std::hint::spin_loop();
                }
            }
        }));
    }
    for h in handles {
        let _ = h.join();
    }

    let expected = total * (total - 1) / 2;
    let elapsed = start.elapsed();
    println!("=== Queue ===");
    println!("Items:       {}", total);
    println!("Sum ok:      {}", sum.load(Ordering::Relaxed) == expected);
    println!("Time:        {:?}", elapsed);
    println!(
        "Throughput:  {:.0} items/sec",
        total as f64 / elapsed.as_secs_f64()
    );
}

fn pool_round(num_tasks: usize, submitters: usize) {
    let pool = Arc::new(match WorkerPool::with_config(PoolConfig::from_env()) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to start pool: {}", e);
            std::process::exit(1);
        }
    });
    let completed = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let per_submitter = num_tasks / submitters;
    let handles: Vec<_> = (0..submitters)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let completed = Arc::clone(&completed);
            thread::spawn(move || {
                for _ in 0..per_submitter {
                    let completed = Arc::clone(&completed);
                    pool.insert(move || {
                        completed.fetch_add(1, Ordering::Relaxed);
                    });
                }
            })
        })
        .collect();
    for h in handles {
        let _ = h.join();
    }
    let submit_time = start.elapsed();

    pool.wait();
    let total_time = start.elapsed();
    let stats = pool.stats();

    println!("\n=== Pool ===");
    println!("Workers:     {}", pool.thread_count());
    println!("Submitted:   {}", per_submitter * submitters);
    println!("Completed:   {}", completed.load(Ordering::Relaxed));
    println!("Executed:    {}", stats.executed);
    println!("Submit time: {:?}", submit_time);
    println!("Total time:  {:?}", total_time);
    println!(
        "Throughput:  {:.0} tasks/sec",
        (per_submitter * submitters) as f64 / total_time.as_secs_f64()
    );
}

fn main() {
    taskpool::init_logging();
    println!("=== taskpool Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let num_tasks: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let submitters: usize = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(4)
        .max(1);

    queue_round(submitters, num_tasks / submitters);
    pool_round(num_tasks, submitters);
}
