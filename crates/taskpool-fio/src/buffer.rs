//! Operation buffer shared by concurrent chunk tasks
//!
//! The scheduler takes ownership of the caller's `Vec<u8>` for the life of
//! an operation. Chunk tasks borrow disjoint byte ranges of it concurrently;
//! the vector is rebuilt and handed back once every chunk has finished.

use std::cell::UnsafeCell;
use std::ptr;
use std::slice;

/// A `Vec<u8>` split into raw parts so disjoint ranges can be lent out
/// to several threads at once.
pub(crate) struct SharedBuffer {
    parts: UnsafeCell<Option<RawParts>>,
}

struct RawParts {
    ptr: *mut u8,
    len: usize,
    cap: usize,
}

// SAFETY: access goes through `slice`/`slice_mut`/`take`, whose callers
// guarantee ranges are disjoint and that `take` runs after all borrows end.
unsafe impl Send for SharedBuffer {}
unsafe impl Sync for SharedBuffer {}

impl SharedBuffer {
    pub(crate) fn new(buffer: Vec<u8>) -> Self {
        let mut buffer = std::mem::ManuallyDrop::new(buffer);
        let parts = RawParts {
            ptr: buffer.as_mut_ptr(),
            len: buffer.len(),
            cap: buffer.capacity(),
        };
        Self {
            parts: UnsafeCell::new(Some(parts)),
        }
    }

    fn parts(&self) -> &RawParts {
        // SAFETY: `parts` is only replaced by `take`, which requires that no
        // other access is live.
        unsafe { (*self.parts.get()).as_ref() }.unwrap_or_else(|| {
            unreachable!("SharedBuffer accessed after take")
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.parts().len
    }

    /// Shared view of `[offset, offset + len)`
    ///
    /// # Safety
    ///
    /// No mutable view overlapping the range may be live.
    pub(crate) unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        let parts = self.parts();
        assert!(offset + len <= parts.len, "chunk range out of buffer");
        slice::from_raw_parts(parts.ptr.add(offset), len)
    }

    /// Exclusive view of `[offset, offset + len)`
    ///
    /// # Safety
    ///
    /// No other view overlapping the range may be live.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        let parts = self.parts();
        assert!(offset + len <= parts.len, "chunk range out of buffer");
        slice::from_raw_parts_mut(parts.ptr.add(offset), len)
    }

    /// Rebuild the original vector
    ///
    /// # Safety
    ///
    /// No view from `slice`/`slice_mut` may be live, and none may be
    /// created afterwards.
    pub(crate) unsafe fn take(&self) -> Vec<u8> {
        match ptr::replace(self.parts.get(), None) {
            Some(p) => Vec::from_raw_parts(p.ptr, p.len, p.cap),
            None => Vec::new(),
        }
    }
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        if let Some(p) = self.parts.get_mut().take() {
            // SAFETY: parts came from a Vec<u8> in `new` and were not taken.
            drop(unsafe { Vec::from_raw_parts(p.ptr, p.len, p.cap) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_take_returns_original() {
        let buf = SharedBuffer::new(vec![1, 2, 3, 4]);
        assert_eq!(buf.len(), 4);
        let v = unsafe { buf.take() };
        assert_eq!(v, vec![1, 2, 3, 4]);
        assert!(unsafe { buf.take() }.is_empty());
    }

    #[test]
    fn test_disjoint_writers() {
        let buf = Arc::new(SharedBuffer::new(vec![0u8; 4096]));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let buf = Arc::clone(&buf);
                thread::spawn(move || {
                    let part = unsafe { buf.slice_mut(i * 1024, 1024) };
                    part.fill(i as u8 + 1);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let v = unsafe { buf.take() };
        for i in 0..4 {
            assert!(v[i * 1024..(i + 1) * 1024].iter().all(|&b| b == i as u8 + 1));
        }
    }

    #[test]
    fn test_drop_without_take() {
        let buf = SharedBuffer::new(vec![7u8; 128]);
        assert_eq!(unsafe { buf.slice(120, 8) }, &[7u8; 8]);
        drop(buf);
    }
}
