//! Byte-range partitioning
//!
//! A plan covers `[0, total)` with contiguous, non-overlapping chunks in
//! index order. Writes use fixed-size chunks; reads pick a chunk count
//! adaptively so each chunk carries a meaningful amount of I/O.

use std::ops::Range;

/// One contiguous byte range of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub index: usize,
    /// Offset relative to the start of the operation's buffer
    pub offset: usize,
    pub len: usize,
}

impl Chunk {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    chunks: Vec<Chunk>,
}

impl ChunkPlan {
    /// `ceil(total / chunk_size)` chunks; only the last may be short
    pub fn fixed(total: usize, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::with_capacity(total.div_ceil(chunk_size));
        let mut offset = 0;
        while offset < total {
            let len = chunk_size.min(total - offset);
            chunks.push(Chunk {
                index: chunks.len(),
                offset,
                len,
            });
            offset += len;
        }
        Self { total, chunks }
    }

    /// Up to `parallelism` equal chunks of at least `min_block` bytes
    ///
    /// The last chunk absorbs the remainder. An empty range has no chunks.
    pub fn adaptive(total: usize, parallelism: usize, min_block: usize) -> Self {
        if total == 0 {
            return Self {
                total,
                chunks: Vec::new(),
            };
        }
        let n = Self::split_count(total, parallelism, min_block);
        let block = total / n;
        let chunks = (0..n)
            .map(|index| {
                let offset = index * block;
                let len = if index + 1 == n { total - offset } else { block };
                Chunk { index, offset, len }
            })
            .collect();
        Self { total, chunks }
    }

    /// Halve `parallelism` until each share reaches `min_block` or one remains
    pub fn split_count(total: usize, parallelism: usize, min_block: usize) -> usize {
        let mut n = parallelism.max(1);
        while n > 1 && total / n < min_block {
            n /= 2;
        }
        n
    }

    /// Bytes covered
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }
}
