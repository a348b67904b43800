//! Error types for chunked file I/O

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type for scheduler submissions
pub type FileResult<T> = Result<T, FileError>;

/// Where in a chunk's life a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkStage {
    /// Opening the file
    Open,
    /// Positioning at the chunk offset
    Seek,
    /// Reading the chunk's bytes
    Read,
    /// Writing the chunk's bytes
    Write,
    /// The pool refused or discarded the chunk before it ran
    Rejected,
}

impl fmt::Display for ChunkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkStage::Open => "open",
            ChunkStage::Seek => "seek",
            ChunkStage::Read => "read",
            ChunkStage::Write => "write",
            ChunkStage::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Failure of a single chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkError {
    pub stage: ChunkStage,
    pub kind: io::ErrorKind,
    pub message: String,
}

impl ChunkError {
    pub fn new(stage: ChunkStage, kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    /// Wrap an `io::Error` raised at `stage`
    pub fn io(stage: ChunkStage, err: &io::Error) -> Self {
        Self::new(stage, err.kind(), err.to_string())
    }

    /// The chunk never ran
    pub fn rejected(reason: &str) -> Self {
        Self::new(ChunkStage::Rejected, io::ErrorKind::Interrupted, reason)
    }
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

impl std::error::Error for ChunkError {}

/// Errors surfaced by [`FileScheduler`](crate::FileScheduler)
#[derive(Debug)]
pub enum FileError {
    /// `stop()` was called; nothing was submitted
    Stopped,

    /// A `FileConfig` value is out of range
    InvalidConfig(&'static str),

    /// Read target does not exist
    NotFound(PathBuf),

    /// Read target exists but is not a regular file
    NotAFile(PathBuf),

    /// The serial set-up step (truncate, create, size probe) failed
    Prepare { path: PathBuf, source: io::Error },

    /// One or more chunks of a finished operation failed
    Chunks {
        path: PathBuf,
        failed: usize,
        total: usize,
        first: ChunkError,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Stopped => write!(f, "file scheduler stopped"),
            FileError::InvalidConfig(msg) => write!(f, "invalid file config: {}", msg),
            FileError::NotFound(p) => write!(f, "{}: not found", p.display()),
            FileError::NotAFile(p) => write!(f, "{}: not a regular file", p.display()),
            FileError::Prepare { path, source } => {
                write!(f, "{}: preparing file failed: {}", path.display(), source)
            }
            FileError::Chunks {
                path,
                failed,
                total,
                first,
            } => write!(
                f,
                "{}: {} of {} chunks failed (first: {})",
                path.display(),
                failed,
                total,
                first
            ),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Prepare { source, .. } => Some(source),
            FileError::Chunks { first, .. } => Some(first),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(FileError::Stopped.to_string(), "file scheduler stopped");

        let e = FileError::Chunks {
            path: PathBuf::from("/tmp/x"),
            failed: 1,
            total: 4,
            first: ChunkError::new(ChunkStage::Write, io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(
            e.to_string(),
            "/tmp/x: 1 of 4 chunks failed (first: write: disk full)"
        );
    }

    #[test]
    fn test_chunk_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let e = ChunkError::io(ChunkStage::Open, &io_err);
        assert_eq!(e.kind, io::ErrorKind::PermissionDenied);
        assert_eq!(e.stage, ChunkStage::Open);
        assert_eq!(e.to_string(), "open: nope");
    }
}
