//! Process clock
//!
//! The start-of-process time reference. Create one in `main` and pass it to
//! whatever reports elapsed times; there is no hidden global.

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic start instant plus the wall-clock time it corresponds to
#[derive(Debug, Clone, Copy)]
pub struct ProcessClock {
    started: Instant,
    wall_start: SystemTime,
}

impl ProcessClock {
    /// Capture "now" as the process start
    pub fn start() -> Self {
        ProcessClock {
            started: Instant::now(),
            wall_start: SystemTime::now(),
        }
    }

    /// Time since [`ProcessClock::start`]
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Offset of `at` from the start (zero if `at` precedes it)
    #[inline]
    pub fn offset_of(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.started)
    }

    /// Wall-clock start as seconds since the Unix epoch
    pub fn wall_start_secs(&self) -> u64 {
        self.wall_start
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Elapsed time formatted as `HH:MM:SS.mmm`
    pub fn stamp(&self) -> Stamp {
        Stamp(self.elapsed())
    }
}

/// `HH:MM:SS.mmm` display of a duration since process start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp(pub Duration);

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            self.0.subsec_millis()
        )
    }
}
