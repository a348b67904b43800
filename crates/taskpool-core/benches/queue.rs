//! Queue throughput: single-thread push/pop and 4x4 MPMC transfer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use taskpool_core::LockFreeQueue;

fn push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue/push_pop");
    for n in [1_000usize, 100_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let q = LockFreeQueue::new();
            b.iter(|| {
                for i in 0..n {
                    q.push(i);
                }
                while let Some(v) = q.pop() {
                    black_box(v);
                }
            });
        });
    }
    group.finish();
}

fn mpmc(c: &mut Criterion) {
    const PER_PRODUCER: usize = 25_000;
    const THREADS: usize = 4;

    let mut group = c.benchmark_group("queue/mpmc");
    group.throughput(Throughput::Elements((PER_PRODUCER * THREADS) as u64));
    group.sample_size(20);
    group.bench_function("4x4", |b| {
        b.iter(|| {
            let q = Arc::new(LockFreeQueue::new());
            let consumed = Arc::new(AtomicUsize::new(0));
            let total = PER_PRODUCER * THREADS;

            let mut handles = Vec::with_capacity(THREADS * 2);
            for _ in 0..THREADS {
                let q = Arc::clone(&q);
                handles.push(thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        q.push(i);
                    }
                }));
            }
            for _ in 0..THREADS {
                let q = Arc::clone(&q);
                let consumed = Arc::clone(&consumed);
                handles.push(thread::spawn(move || {
                    while consumed.load(Ordering::Relaxed) < total {
                        if q.pop().is_some() {
                            consumed.fetch_add(1, Ordering::Relaxed);
                        } else {
                            std::hint::spin_loop();
                        }
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
        });
    });
    group.finish();
}

criterion_group!(benches, push_pop, mpmc);
criterion_main!(benches);
