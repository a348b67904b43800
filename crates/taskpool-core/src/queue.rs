//! Unbounded lock-free MPMC queue
//!
//! Michael-Scott linked list. The head always points at a sentinel node whose
//! payload is either uninitialised or already moved out; `pop` advances head
//! to the sentinel's successor and moves that node's payload out, turning it
//! into the new sentinel.
//!
//! Retired sentinels are handed to the `crossbeam_epoch` collector instead of
//! being freed on the spot: a racing `pop` may still hold a pointer to the old
//! head and read its `next` field, so the node is only destroyed once every
//! thread pinned at retirement time has unpinned.
//!
//! ```ignore
//! use taskpool_core::LockFreeQueue;
//!
//! let q = LockFreeQueue::new();
//! q.push(1);
//! q.push(2);
//! assert_eq!(q.pop(), Some(1));
//! ```

use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use crossbeam_utils::{Backoff, CachePadded};

struct Node<T> {
    /// Initialised for every node except the current sentinel.
    data: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Node {
            data: MaybeUninit::uninit(),
            next: Atomic::null(),
        }
    }

    fn with(value: T) -> Self {
        Node {
            data: MaybeUninit::new(value),
            next: Atomic::null(),
        }
    }
}

/// Lock-free unbounded FIFO queue
///
/// `push` and `pop` never block and may be called from any number of
/// threads. `len` and `is_empty` are snapshots for diagnostics only.
pub struct LockFreeQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
    /// Incremented before a node is linked, decremented after a node is
    /// claimed, so it never underflows.
    len: CachePadded<AtomicUsize>,
}

// Safety: payloads move between threads through push/pop; the queue never
// hands out shared references to them.
unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    /// Create an empty queue (one sentinel node)
    pub fn new() -> Self {
        let queue = LockFreeQueue {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
            len: CachePadded::new(AtomicUsize::new(0)),
        };
        // Safety: the queue is not shared yet.
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = Owned::new(Node::sentinel()).into_shared(guard);
            queue.head.store(sentinel, Ordering::Relaxed);
            queue.tail.store(sentinel, Ordering::Relaxed);
        }
        queue
    }

    /// Append a value at the tail
    pub fn push(&self, value: T) {
        self.len.fetch_add(1, Ordering::Relaxed);

        let guard = &epoch::pin();
        let new = Owned::new(Node::with(value)).into_shared(guard);
        let backoff = Backoff::new();

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // Safety: tail is never null and nodes reachable from tail are
            // only retired after head has moved past them under a pin.
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);

            if !next.is_null() {
                // Tail is lagging; help it forward and retry.
                let _ = self
                    .tail
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
                continue;
            }

            if tail_ref
                .next
                .compare_exchange(Shared::null(), new, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok()
            {
                let _ = self
                    .tail
                    .compare_exchange(tail, new, Ordering::Release, Ordering::Relaxed, guard);
                return;
            }

            backoff.spin();
        }
    }

    /// Remove the value at the head, or `None` if the queue is empty
    pub fn pop(&self) -> Option<T> {
        let guard = &epoch::pin();
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            // Safety: head is never null; see push.
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);
            // Safety: a non-null next is a live node while we are pinned.
            let next_ref = unsafe { next.as_ref() }?;

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok()
            {
                // Never leave tail pointing at a node about to be retired.
                let tail = self.tail.load(Ordering::Relaxed, guard);
                if tail == head {
                    let _ = self
                        .tail
                        .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
                }

                // Safety: winning the head CAS gives this call exclusive
                // claim to next's payload; the node is now the sentinel and
                // its payload is treated as uninitialised from here on.
                let value = unsafe { next_ref.data.assume_init_read() };
                // Safety: head is unlinked and unreachable for new readers.
                unsafe { guard.defer_destroy(head) };
                self.len.fetch_sub(1, Ordering::Relaxed);
                return Some(value);
            }

            backoff.spin();
        }
    }

    /// Approximate number of queued values
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether the sentinel currently has no successor
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        // Safety: head is never null; see push.
        unsafe { head.deref() }.next.load(Ordering::Acquire, guard).is_null()
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
        // Safety: &mut self, no other thread can observe the sentinel.
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = self.head.load(Ordering::Relaxed, guard);
            drop(sentinel.into_owned());
        }
    }
}

impl<T> core::fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_empty_pop() {
        let q: LockFreeQueue<u32> = LockFreeQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_spsc_fifo() {
        let q = LockFreeQueue::new();
        for i in 1..=1000u32 {
            q.push(i);
        }
        assert_eq!(q.len(), 1000);
        assert!(!q.is_empty());

        let popped: Vec<u32> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(popped, (1..=1000).collect::<Vec<_>>());
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_interleaved_push_pop() {
        let q = LockFreeQueue::new();
        q.push("a");
        q.push("b");
        assert_eq!(q.pop(), Some("a"));
        q.push("c");
        assert_eq!(q.pop(), Some("b"));
        assert_eq!(q.pop(), Some("c"));
        assert_eq!(q.pop(), None);
        q.push("d");
        assert_eq!(q.pop(), Some("d"));
    }

    #[test]
    fn test_spsc_concurrent_order() {
        const N: u64 = 50_000;
        let q = Arc::new(LockFreeQueue::new());

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..N {
                    q.push(i);
                }
            })
        };

        let mut expected = 0;
        while expected < N {
            if let Some(v) = q.pop() {
                assert_eq!(v, expected);
                expected += 1;
            } else {
                std::hint::spin_loop();
            }
        }
        producer.join().unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn test_mpmc_no_loss_no_duplication() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 20_000;

        let q = Arc::new(LockFreeQueue::new());
        let produced_done = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(PRODUCERS + CONSUMERS));

        let mut producers = Vec::new();
        for p in 0..PRODUCERS {
            let q = Arc::clone(&q);
            let done = Arc::clone(&produced_done);
            let barrier = Arc::clone(&barrier);
            producers.push(thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_PRODUCER {
                    // Disjoint labelled ranges per producer.
                    q.push(p * PER_PRODUCER + i);
                }
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let mut consumers = Vec::new();
        for _ in 0..CONSUMERS {
            let q = Arc::clone(&q);
            let done = Arc::clone(&produced_done);
            let barrier = Arc::clone(&barrier);
            consumers.push(thread::spawn(move || {
                barrier.wait();
                let mut got = Vec::new();
                loop {
                    match q.pop() {
                        Some(v) => got.push(v),
                        None if done.load(Ordering::SeqCst) == PRODUCERS => {
                            // Producers finished; drain whatever is left.
                            while let Some(v) = q.pop() {
                                got.push(v);
                            }
                            break;
                        }
                        None => std::hint::spin_loop(),
                    }
                }
                got
            }));
        }

        for p in producers {
            p.join().unwrap();
        }
        let mut all = Vec::new();
        for c in consumers {
            all.extend(c.join().unwrap());
        }

        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
        let unique: HashSet<usize> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len(), "a value was popped twice");
        assert_eq!(unique, (0..PRODUCERS * PER_PRODUCER).collect::<HashSet<_>>());
        assert!(q.is_empty());
    }

    #[test]
    fn test_per_producer_order_preserved() {
        const PER_PRODUCER: usize = 10_000;
        let q = Arc::new(LockFreeQueue::new());

        let handles: Vec<_> = (0..3)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        q.push((p, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut last = [None::<usize>; 3];
        while let Some((p, i)) = q.pop() {
            if let Some(prev) = last[p] {
                assert!(i > prev, "producer {p} reordered: {prev} then {i}");
            }
            last[p] = Some(i);
        }
        assert_eq!(last, [Some(PER_PRODUCER - 1); 3]);
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_drop_releases_remaining_payloads() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let q = LockFreeQueue::new();
            for _ in 0..10 {
                q.push(DropCounter(Arc::clone(&drops)));
            }
            drop(q.pop());
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_boxed_closures() {
        let q: LockFreeQueue<Box<dyn FnOnce() -> u32 + Send>> = LockFreeQueue::new();
        q.push(Box::new(|| 7));
        q.push(Box::new(|| 9));
        let sum: u32 = std::iter::from_fn(|| q.pop()).map(|f| f()).sum();
        assert_eq!(sum, 16);
    }
}
