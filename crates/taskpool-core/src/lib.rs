//! # taskpool-core
//!
//! Platform-agnostic building blocks for the taskpool engine.
//!
//! ## Modules
//!
//! - `queue` - Lock-free MPMC queue with epoch-based reclamation
//! - `owner` - Per-thread owner tokens
//! - `owner_box` - Reentrant single-owner container
//! - `clock` - Explicit process start clock
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod queue;
pub mod owner;
pub mod owner_box;
pub mod clock;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use queue::LockFreeQueue;
pub use owner::OwnerToken;
pub use owner_box::{OwnerBox, OwnerGuard};
pub use clock::{ProcessClock, Stamp};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_size, env_is_set, parse_size};

/// Size constants
pub mod constants {
    /// One kibibyte
    pub const KIB: usize = 1024;

    /// One mebibyte
    pub const MIB: usize = KIB * 1024;
}
