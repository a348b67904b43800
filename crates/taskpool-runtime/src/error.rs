//! Error types for the worker pool

use std::fmt;
use std::io;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur while building a pool
#[derive(Debug)]
pub enum PoolError {
    /// The OS refused to spawn a worker thread
    Spawn(io::Error),

    /// Configuration failed validation
    InvalidConfig(&'static str),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
            PoolError::InvalidConfig(msg) => write!(f, "invalid pool config: {}", msg),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::Spawn(e) => Some(e),
            PoolError::InvalidConfig(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let e = PoolError::InvalidConfig("num_threads must be > 0");
        assert_eq!(e.to_string(), "invalid pool config: num_threads must be > 0");
        assert!(e.source().is_none());

        let e = PoolError::Spawn(io::Error::new(io::ErrorKind::OutOfMemory, "no threads"));
        assert!(e.to_string().starts_with("failed to spawn worker thread"));
        assert!(e.source().is_some());
    }
}
