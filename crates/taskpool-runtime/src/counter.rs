//! Outstanding-work counter with blocking wait
//!
//! The count itself is a plain atomic so increments and decrements stay
//! lock-free. The mutex/condvar pair is only touched by waiters and by the
//! decrement that brings the count to zero.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Atomic counter whose [`wait`](TaskCounter::wait) returns exactly when the
/// count is zero.
#[derive(Debug, Default)]
pub struct TaskCounter {
    count: AtomicUsize,
    lock: Mutex<()>,
    zero: Condvar,
}

impl TaskCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            lock: Mutex::new(()),
            zero: Condvar::new(),
        }
    }

    /// Current outstanding count
    #[inline]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.get() == 0
    }

    #[inline]
    pub fn increment(&self) {
        self.add(1);
    }

    #[inline]
    pub fn add(&self, n: usize) {
        self.count.fetch_add(n, Ordering::AcqRel);
    }

    /// Mark one unit done; returns the remaining count
    #[inline]
    pub fn decrement(&self) -> usize {
        self.sub(1)
    }

    /// Mark `n` units done; returns the remaining count
    pub fn sub(&self, n: usize) -> usize {
        if n == 0 {
            return self.get();
        }
        let prev = self.count.fetch_sub(n, Ordering::AcqRel);
        debug_assert!(prev >= n, "TaskCounter underflow: {} - {}", prev, n);
        let remaining = prev - n;
        if remaining == 0 {
            // Taking the lock orders this notify after any waiter that has
            // checked the count but not yet parked.
            let _guard = self.lock_inner();
            self.zero.notify_all();
        }
        remaining
    }

    /// Block until the count reaches zero
    pub fn wait(&self) {
        if self.is_zero() {
            return;
        }
        let guard = self.lock_inner();
        let _guard = self
            .zero
            .wait_while(guard, |_| !self.is_zero())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Block until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the count is zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock_inner();
        while !self.is_zero() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .zero
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn lock_inner(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counts() {
        let c = TaskCounter::new();
        assert!(c.is_zero());
        c.increment();
        c.add(4);
        assert_eq!(c.get(), 5);
        assert_eq!(c.decrement(), 4);
        assert_eq!(c.sub(4), 0);
        assert_eq!(c.sub(0), 0);
    }

    #[test]
    fn test_wait_returns_immediately_at_zero() {
        let c = TaskCounter::new();
        c.wait();
        assert!(c.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn test_wait_wakes_on_zero() {
        let c = Arc::new(TaskCounter::new());
        c.add(8);

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(i * 2));
                    c.decrement();
                })
            })
            .collect();

        c.wait();
        assert!(c.is_zero());
        for w in workers {
            w.join().unwrap();
        }
    }

    #[test]
    fn test_wait_timeout_expires() {
        let c = TaskCounter::new();
        c.increment();
        let start = Instant::now();
        assert!(!c.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        c.decrement();
        assert!(c.wait_timeout(Duration::from_millis(20)));
    }
}
