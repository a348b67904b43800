//! Per-operation results

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ChunkError, FileError, FileResult};
use crate::plan::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoKind {
    Read,
    Write,
}

impl fmt::Display for IoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoKind::Read => f.write_str("read"),
            IoKind::Write => f.write_str("write"),
        }
    }
}

/// How one chunk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub chunk: Chunk,
    pub result: Result<(), ChunkError>,
}

impl ChunkOutcome {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a finished read or write
///
/// Holds one outcome per chunk in index order and gives the operation's
/// buffer back. After a read with failed chunks, the bytes in those chunks'
/// ranges are unspecified.
#[derive(Debug)]
pub struct IoReport {
    pub(crate) path: PathBuf,
    pub(crate) kind: IoKind,
    pub(crate) base_offset: u64,
    pub(crate) chunks: Vec<ChunkOutcome>,
    pub(crate) buffer: Vec<u8>,
}

impl IoReport {
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn kind(&self) -> IoKind {
        self.kind
    }

    /// File offset of the buffer's first byte (non-zero for appends)
    #[inline]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    #[inline]
    pub fn chunks(&self) -> &[ChunkOutcome] {
        &self.chunks
    }

    /// True when every chunk succeeded
    pub fn is_ok(&self) -> bool {
        self.chunks.iter().all(ChunkOutcome::is_ok)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.chunks.iter().filter(|c| !c.is_ok())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Bytes moved by successful chunks
    pub fn bytes_ok(&self) -> u64 {
        self.chunks
            .iter()
            .filter(|c| c.is_ok())
            .map(|c| c.chunk.len as u64)
            .sum()
    }

    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    /// The buffer if every chunk succeeded, else [`FileError::Chunks`]
    pub fn into_result(self) -> FileResult<Vec<u8>> {
        let total = self.chunks.len();
        let mut failed = self.chunks.iter().filter_map(|c| c.result.as_ref().err());
        match failed.next() {
            None => Ok(self.buffer),
            Some(first) => {
                let first = first.clone();
                let failed = 1 + failed.count();
                Err(FileError::Chunks {
                    path: self.path,
                    failed,
                    total,
                    first,
                })
            }
        }
    }
}
