//! Worker pool configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env`)
//! 3. Library defaults (`defaults`)
//!
//! ```rust,ignore
//! use taskpool_runtime::config::PoolConfig;
//!
//! let config = PoolConfig::from_env()
//!     .num_threads(8)
//!     .idle_spins(200);
//! ```

pub mod defaults;

use std::time::Duration;
use taskpool_core::env::env_get;

use crate::error::{PoolError, PoolResult};

/// Worker pool configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads
    pub num_threads: usize,
    /// Empty polls spent spinning before the first sleep
    pub idle_spins: u32,
    /// First idle sleep
    pub backoff_start: Duration,
    /// Longest idle sleep
    pub backoff_max: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `TASKPOOL_THREADS` - Number of worker threads
    /// - `TASKPOOL_IDLE_SPINS` - Spins before sleeping
    /// - `TASKPOOL_BACKOFF_START_US` - First idle sleep in microseconds
    /// - `TASKPOOL_BACKOFF_MAX_US` - Idle sleep cap in microseconds
    pub fn from_env() -> Self {
        Self {
            num_threads: env_get("TASKPOOL_THREADS", defaults::num_threads()),
            idle_spins: env_get("TASKPOOL_IDLE_SPINS", defaults::IDLE_SPINS),
            backoff_start: Duration::from_micros(env_get(
                "TASKPOOL_BACKOFF_START_US",
                defaults::BACKOFF_START_US,
            )),
            backoff_max: Duration::from_micros(env_get(
                "TASKPOOL_BACKOFF_MAX_US",
                defaults::BACKOFF_MAX_US,
            )),
        }
    }

    /// Create config with library defaults only (no env override).
    pub fn new() -> Self {
        Self {
            num_threads: defaults::num_threads(),
            idle_spins: defaults::IDLE_SPINS,
            backoff_start: Duration::from_micros(defaults::BACKOFF_START_US),
            backoff_max: Duration::from_micros(defaults::BACKOFF_MAX_US),
        }
    }

    // Builder methods

    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn idle_spins(mut self, spins: u32) -> Self {
        self.idle_spins = spins;
        self
    }

    pub fn backoff_start(mut self, d: Duration) -> Self {
        self.backoff_start = d;
        self
    }

    pub fn backoff_max(mut self, d: Duration) -> Self {
        self.backoff_max = d;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> PoolResult<()> {
        if self.num_threads == 0 {
            return Err(PoolError::InvalidConfig("num_threads must be > 0"));
        }
        if self.num_threads > defaults::MAX_THREADS {
            return Err(PoolError::InvalidConfig("num_threads exceeds MAX_THREADS"));
        }
        if self.backoff_start.is_zero() {
            return Err(PoolError::InvalidConfig("backoff_start must be > 0"));
        }
        if self.backoff_start > self.backoff_max {
            return Err(PoolError::InvalidConfig("backoff_start must be <= backoff_max"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        taskpool_core::kprintln!("taskpool configuration:");
        taskpool_core::kprintln!("  num_threads:    {}", self.num_threads);
        taskpool_core::kprintln!("  idle_spins:     {}", self.idle_spins);
        taskpool_core::kprintln!("  backoff_start:  {:?}", self.backoff_start);
        taskpool_core::kprintln!("  backoff_max:    {:?}", self.backoff_max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = PoolConfig::new();
        assert!(config.num_threads >= 1);
        assert_eq!(config.idle_spins, 100);
        assert_eq!(config.backoff_start, Duration::from_micros(100));
        assert_eq!(config.backoff_max, Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::new()
            .num_threads(8)
            .idle_spins(10)
            .backoff_max(Duration::from_millis(5));

        assert_eq!(config.num_threads, 8);
        assert_eq!(config.idle_spins, 10);
        assert_eq!(config.backoff_max, Duration::from_millis(5));
    }

    #[test]
    fn test_validation() {
        assert!(PoolConfig::new().num_threads(0).validate().is_err());
        assert!(PoolConfig::new().num_threads(100_000).validate().is_err());
        assert!(PoolConfig::new()
            .backoff_start(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PoolConfig::new()
            .backoff_start(Duration::from_millis(2))
            .backoff_max(Duration::from_millis(1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_env_override() {
        std::env::set_var("TASKPOOL_IDLE_SPINS", "7");
        let config = PoolConfig::from_env();
        std::env::remove_var("TASKPOOL_IDLE_SPINS");
        assert_eq!(config.idle_spins, 7);
    }
}
