//! Owner tokens
//!
//! A comparable per-thread identity that fits in an atomic word. Each OS
//! thread is lazily assigned a token from a process-wide counter on first
//! use; tokens are never reused, so a stale owner field can never match a
//! thread that started later.

use core::fmt;
use core::num::NonZeroU64;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Raw value stored in an atomic owner field when nothing holds it
pub const NO_OWNER: u64 = 0;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<u64> = const { Cell::new(NO_OWNER) };
}

/// Identity of the thread holding (or trying to hold) an owned resource
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct OwnerToken(NonZeroU64);

impl OwnerToken {
    /// Token of the calling thread
    #[inline]
    pub fn current() -> Self {
        CURRENT.with(|cell| {
            let raw = match cell.get() {
                NO_OWNER => {
                    let fresh = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
                    cell.set(fresh);
                    fresh
                }
                raw => raw,
            };
            // Counter starts at 1 and a u64 will not wrap.
            OwnerToken(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
        })
    }

    /// Rebuild a token from an owner field; `None` for [`NO_OWNER`]
    #[inline]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(v) => Some(OwnerToken(v)),
            None => None,
        }
    }

    /// Raw value for storing in an atomic owner field
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerToken({})", self.0)
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_stable_within_thread() {
        assert_eq!(OwnerToken::current(), OwnerToken::current());
    }

    #[test]
    fn test_distinct_across_threads() {
        let here = OwnerToken::current();
        let there = thread::spawn(OwnerToken::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_raw_roundtrip() {
        let t = OwnerToken::current();
        assert_ne!(t.as_raw(), NO_OWNER);
        assert_eq!(OwnerToken::from_raw(t.as_raw()), Some(t));
        assert_eq!(OwnerToken::from_raw(NO_OWNER), None);
    }
}
