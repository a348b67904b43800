//! Recursive ownership box
//!
//! A value guarded by a single owner. The owning thread may re-acquire the
//! box any number of times; every other thread gets `None` from [`OwnerBox::get`]
//! until the owner has released every guard.
//!
//! Ownership is keyed on [`OwnerToken`], not on ambient thread ids.
//! Guards are `!Send`, so a guard cannot be released from a thread other
//! than the one that acquired it.

use core::cell::{Cell, UnsafeCell};
use core::marker::PhantomData;
use core::ops::Deref;
use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::Backoff;

use crate::owner::{OwnerToken, NO_OWNER};

/// Sleep between ownership probes in `set` once spinning has been exhausted
const SET_POLL_INTERVAL: Duration = Duration::from_micros(10);

/// Single-owner, reentrant container
///
/// ```ignore
/// let shared = OwnerBox::new(Cell::new(0));
/// if let Some(guard) = shared.get() {
///     guard.set(guard.get() + 1);
///     let again = shared.get().unwrap(); // reentrant
///     drop(again);
/// }
/// ```
pub struct OwnerBox<T> {
    owner: AtomicU64,
    /// Reentrancy depth; only read or written by the current owner.
    depth: Cell<u64>,
    value: UnsafeCell<T>,
}

// Safety: the value is only reachable through guards held by one thread at a
// time (T: Send), and guards hand out shared references across reentrant
// acquisitions on that same thread only.
unsafe impl<T: Send> Send for OwnerBox<T> {}
unsafe impl<T: Send> Sync for OwnerBox<T> {}

impl<T> OwnerBox<T> {
    /// Create a free box holding `value`
    pub const fn new(value: T) -> Self {
        OwnerBox {
            owner: AtomicU64::new(NO_OWNER),
            depth: Cell::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Non-blocking acquire
    ///
    /// Reentrant for the current owner; `None` if another thread holds it.
    pub fn get(&self) -> Option<OwnerGuard<'_, T>> {
        let me = OwnerToken::current();
        let current = self.owner.load(Ordering::Acquire);

        if current == me.as_raw() {
            self.depth.set(self.depth.get() + 1);
            return Some(OwnerGuard::new(self, me));
        }

        if current == NO_OWNER
            && self
                .owner
                .compare_exchange(NO_OWNER, me.as_raw(), Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            self.depth.set(1);
            return Some(OwnerGuard::new(self, me));
        }

        None
    }

    /// Replace the value once the box is free
    ///
    /// Spins, then sleeps in short intervals, until no thread owns the box;
    /// the write itself happens under a temporary claim, so a concurrent
    /// `get` sees either the old or the new value, never a torn one.
    ///
    /// # Panics
    ///
    /// If the calling thread currently holds a guard on this box.
    pub fn set(&self, value: T) {
        let me = OwnerToken::current();
        assert!(
            self.owner.load(Ordering::Relaxed) != me.as_raw(),
            "OwnerBox::set called by {} while it holds the box",
            me
        );

        let backoff = Backoff::new();
        while self
            .owner
            .compare_exchange_weak(NO_OWNER, me.as_raw(), Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            if backoff.is_completed() {
                std::thread::sleep(SET_POLL_INTERVAL);
            } else {
                backoff.snooze();
            }
        }

        // Safety: we hold the claim and no guard exists.
        unsafe { *self.value.get() = value };
        self.owner.store(NO_OWNER, Ordering::Release);
    }

    /// Whether any thread currently owns the box
    #[inline]
    pub fn is_held(&self) -> bool {
        self.owner.load(Ordering::Relaxed) != NO_OWNER
    }

    /// Current owner, if any (a snapshot)
    #[inline]
    pub fn owner(&self) -> Option<OwnerToken> {
        OwnerToken::from_raw(self.owner.load(Ordering::Relaxed))
    }

    /// Mutable access without locking; `&mut self` rules out any guard
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consume the box and return the value
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    fn release(&self, token: OwnerToken) {
        let owner = self.owner.load(Ordering::Relaxed);
        assert!(
            owner == token.as_raw(),
            "OwnerBox released by {} but owned by {:?}",
            token,
            OwnerToken::from_raw(owner)
        );

        let depth = self.depth.get() - 1;
        self.depth.set(depth);
        if depth == 0 {
            self.owner.store(NO_OWNER, Ordering::Release);
        }
    }
}

impl<T: Default> Default for OwnerBox<T> {
    fn default() -> Self {
        OwnerBox::new(T::default())
    }
}

impl<T> core::fmt::Debug for OwnerBox<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OwnerBox")
            .field("owner", &self.owner())
            .finish_non_exhaustive()
    }
}

/// Access handle returned by [`OwnerBox::get`]
///
/// Dropping the guard (or calling [`OwnerGuard::release`]) undoes exactly one
/// acquisition.
pub struct OwnerGuard<'a, T> {
    owner_box: &'a OwnerBox<T>,
    token: OwnerToken,
    /// Pins the guard to the acquiring thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a, T> OwnerGuard<'a, T> {
    fn new(owner_box: &'a OwnerBox<T>, token: OwnerToken) -> Self {
        OwnerGuard {
            owner_box,
            token,
            _not_send: PhantomData,
        }
    }

    /// Explicitly release this acquisition
    #[inline]
    pub fn release(self) {
        drop(self);
    }

    /// Reentrancy depth including this guard
    pub fn depth(&self) -> u64 {
        self.owner_box.depth.get()
    }
}

impl<'a, T> Deref for OwnerGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: we own the box; other guards on this thread only hold
        // shared references too.
        unsafe { &*self.owner_box.value.get() }
    }
}

impl<'a, T> Drop for OwnerGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.owner_box.release(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_get_and_release() {
        let b = OwnerBox::new(5u32);
        assert!(!b.is_held());
        {
            let g = b.get().unwrap();
            assert_eq!(*g, 5);
            assert!(b.is_held());
            assert_eq!(b.owner(), Some(OwnerToken::current()));
        }
        assert!(!b.is_held());
        assert_eq!(b.owner(), None);
    }

    #[test]
    fn test_reentrant_acquire() {
        let b = OwnerBox::new(Cell::new(0));
        let g1 = b.get().unwrap();
        let g2 = b.get().unwrap();
        assert_eq!(g2.depth(), 2);
        g2.set(g1.get() + 1);
        g2.release();
        assert!(b.is_held(), "still held by the outer guard");
        assert_eq!(g1.get(), 1);
        g1.release();
        assert!(!b.is_held());
    }

    #[test]
    fn test_other_thread_cannot_acquire() {
        let b = Arc::new(OwnerBox::new(0u8));
        let guard = b.get().unwrap();

        let b2 = Arc::clone(&b);
        let got = thread::spawn(move || b2.get().is_some()).join().unwrap();
        assert!(!got);

        drop(guard);
        let b2 = Arc::clone(&b);
        let got = thread::spawn(move || b2.get().is_some()).join().unwrap();
        assert!(got);
    }

    #[test]
    fn test_set_waits_for_release() {
        let b = Arc::new(OwnerBox::new(1u64));
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let b = Arc::clone(&b);
            thread::spawn(move || {
                let g = b.get().unwrap();
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                assert_eq!(*g, 1, "set must not write while the box is held");
                drop(g);
            })
        };

        held_rx.recv().unwrap();
        let setter = {
            let b = Arc::clone(&b);
            thread::spawn(move || b.set(2))
        };
        thread::sleep(Duration::from_millis(20));
        release_tx.send(()).unwrap();

        holder.join().unwrap();
        setter.join().unwrap();
        assert_eq!(*b.get().unwrap(), 2);
    }

    #[test]
    #[should_panic(expected = "while it holds the box")]
    fn test_set_while_holding_panics() {
        let b = OwnerBox::new(0);
        let _g = b.get().unwrap();
        b.set(1);
    }

    #[test]
    fn test_mutual_exclusion_under_contention() {
        let b = Arc::new(OwnerBox::new(AtomicUsize::new(0)));
        let inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let b = Arc::clone(&b);
            let inside = Arc::clone(&inside);
            handles.push(thread::spawn(move || {
                let mut acquired = 0;
                while acquired < 500 {
                    if let Some(g) = b.get() {
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        g.fetch_add(1, Ordering::Relaxed);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        acquired += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(b.get().unwrap().load(Ordering::Relaxed), 2000);
    }

    #[test]
    fn test_get_mut_and_into_inner() {
        let mut b = OwnerBox::new(vec![1]);
        b.get_mut().push(2);
        assert_eq!(b.into_inner(), vec![1, 2]);
    }
}
