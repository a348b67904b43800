//! File access backends
//!
//! The scheduler only touches the filesystem through [`FileBackend`]. Every
//! chunk opens its own handle, so chunks of one file never share a cursor.
//! [`OsBackend`] uses positioned I/O where the platform has it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::error::{ChunkError, ChunkStage};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as platform;
    } else {
        mod fallback;
        use fallback as platform;
    }
}

/// What the scheduler needs to know about a read target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub len: u64,
    pub is_file: bool,
}

/// Filesystem operations used by the scheduler
///
/// The three preparation calls run serially on the submitting thread. The
/// positioned calls run on pool workers, concurrently for disjoint ranges
/// of the same path.
pub trait FileBackend: Send + Sync + 'static {
    /// Size and type of `path`; `ErrorKind::NotFound` if it does not exist
    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Create `path` or cut it to zero length
    fn truncate(&self, path: &Path) -> io::Result<()>;

    /// Create `path` if missing and return its current size
    fn ensure(&self, path: &Path) -> io::Result<u64>;

    /// Write all of `data` at `offset`
    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), ChunkError>;

    /// Fill all of `buf` from `offset`
    fn read_at(&self, path: &Path, offset: u64, buf: &mut [u8]) -> Result<(), ChunkError>;
}

/// The operating system's filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

impl FileBackend for OsBackend {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = std::fs::metadata(path)?;
        Ok(FileStat {
            len: meta.len(),
            is_file: meta.is_file(),
        })
    }

    fn truncate(&self, path: &Path) -> io::Result<()> {
        File::create(path).map(drop)
    }

    fn ensure(&self, path: &Path) -> io::Result<u64> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(file.metadata()?.len())
    }

    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), ChunkError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| ChunkError::io(ChunkStage::Open, &e))?;
        platform::write_all_at(&file, offset, data)
    }

    fn read_at(&self, path: &Path, offset: u64, buf: &mut [u8]) -> Result<(), ChunkError> {
        let file = File::open(path).map_err(|e| ChunkError::io(ChunkStage::Open, &e))?;
        platform::read_exact_at(&file, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_positioned_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let backend = OsBackend;

        backend.truncate(&path).unwrap();
        backend.write_at(&path, 4, b"world").unwrap();
        backend.write_at(&path, 0, b"hell").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hellworld");

        let mut buf = [0u8; 5];
        backend.read_at(&path, 4, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_ensure_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.bin");
        let backend = OsBackend;

        assert_eq!(backend.ensure(&path).unwrap(), 0);
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(backend.ensure(&path).unwrap(), 3);
    }

    #[test]
    fn test_stat_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let backend = OsBackend;

        let stat = backend.stat(dir.path()).unwrap();
        assert!(!stat.is_file);

        let err = backend.stat(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_read_past_end_is_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, b"abc").unwrap();

        let mut buf = [0u8; 8];
        let err = OsBackend.read_at(&path, 0, &mut buf).unwrap_err();
        assert_eq!(err.stage, ChunkStage::Read);
        assert_eq!(err.kind, ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_write_missing_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = OsBackend
            .write_at(&dir.path().join("nope"), 0, b"x")
            .unwrap_err();
        assert_eq!(err.stage, ChunkStage::Open);
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
