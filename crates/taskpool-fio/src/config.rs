//! File scheduler configuration
//!
//! Environment variables (all optional, sizes accept `K`/`M`/`G` suffixes):
//! - `TASKPOOL_CHUNK_SIZE` - Write chunk size (floored at [`MIN_CHUNK_SIZE`])
//! - `TASKPOOL_READ_MIN_BLOCK` - Smallest per-chunk share of a read
//! - `TASKPOOL_READ_PARALLELISM` - Starting chunk count for reads

use taskpool_core::constants::MIB;
use taskpool_core::env::{env_get, env_get_size};
use taskpool_runtime::config::defaults;

use crate::error::{FileError, FileResult};

/// Smallest write chunk the scheduler will use
pub const MIN_CHUNK_SIZE: usize = 16 * MIB;

/// Default smallest per-chunk share of a read
pub const DEFAULT_READ_MIN_BLOCK: usize = 64 * MIB;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    /// Requested write chunk size; `usize::MAX` writes each buffer as one chunk
    pub chunk_size: usize,
    /// Reads are split while every chunk stays at least this large
    pub read_min_block: usize,
    /// Chunk count a read starts halving from
    pub read_parallelism: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl FileConfig {
    /// Library defaults with `TASKPOOL_*` overrides
    pub fn from_env() -> Self {
        Self {
            chunk_size: env_get_size("TASKPOOL_CHUNK_SIZE", usize::MAX),
            read_min_block: env_get_size("TASKPOOL_READ_MIN_BLOCK", DEFAULT_READ_MIN_BLOCK),
            read_parallelism: env_get("TASKPOOL_READ_PARALLELISM", defaults::num_threads()),
        }
    }

    /// Library defaults only
    pub fn new() -> Self {
        Self {
            chunk_size: usize::MAX,
            read_min_block: DEFAULT_READ_MIN_BLOCK,
            read_parallelism: defaults::num_threads(),
        }
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn read_min_block(mut self, size: usize) -> Self {
        self.read_min_block = size;
        self
    }

    pub fn read_parallelism(mut self, n: usize) -> Self {
        self.read_parallelism = n;
        self
    }

    /// Reject values the scheduler would otherwise clamp
    pub fn validate(&self) -> FileResult<()> {
        if self.chunk_size == 0 {
            return Err(FileError::InvalidConfig("chunk_size must be > 0"));
        }
        if self.read_min_block == 0 {
            return Err(FileError::InvalidConfig("read_min_block must be > 0"));
        }
        if self.read_parallelism == 0 {
            return Err(FileError::InvalidConfig("read_parallelism must be > 0"));
        }
        Ok(())
    }

    /// Chunk size after applying the [`MIN_CHUNK_SIZE`] floor
    #[inline]
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(MIN_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor() {
        assert_eq!(FileConfig::new().chunk_size(1).effective_chunk_size(), MIN_CHUNK_SIZE);
        assert_eq!(
            FileConfig::new().chunk_size(MIN_CHUNK_SIZE).effective_chunk_size(),
            MIN_CHUNK_SIZE
        );
        assert_eq!(
            FileConfig::new().chunk_size(32 * MIB).effective_chunk_size(),
            32 * MIB
        );
        assert_eq!(FileConfig::new().effective_chunk_size(), usize::MAX);
    }

    #[test]
    fn test_validate() {
        assert!(FileConfig::new().validate().is_ok());
        assert!(matches!(
            FileConfig::new().read_parallelism(0).validate(),
            Err(FileError::InvalidConfig(_))
        ));
        assert!(FileConfig::new().chunk_size(0).validate().is_err());
    }

    #[test]
    fn test_from_env_size_suffix() {
        std::env::set_var("TASKPOOL_READ_MIN_BLOCK", "8M");
        let config = FileConfig::from_env();
        std::env::remove_var("TASKPOOL_READ_MIN_BLOCK");
        assert_eq!(config.read_min_block, 8 * MIB);
    }
}
