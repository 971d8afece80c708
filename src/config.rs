//! Tracker settings.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of files a [`Tracker`](crate::Tracker) will track.
pub const DEFAULT_CAPACITY: usize = 32;

/// Default size, in bytes, of the per-file line buffer.
pub const DEFAULT_LINE_CAPACITY: usize = 1024;

/// Default pause between two cycles.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Settings for a [`Tracker`](crate::Tracker).
///
/// The defaults watch the process's working directory, track at most 32
/// files, read through a 1024-byte line buffer and pause one second between
/// cycles.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Directory whose regular files are tailed. Entry names are resolved
    /// relative to it.
    pub dir: PathBuf,
    /// Maximum number of tracked files.
    pub capacity: usize,
    /// Size of the line buffer; longer lines are emitted in several chunks.
    pub line_capacity: usize,
    /// Pause at the end of every cycle.
    pub period: Duration,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the line buffer size. A zero size could never make progress, so
    /// it is raised to one byte.
    pub fn with_line_capacity(mut self, line_capacity: usize) -> Self {
        self.line_capacity = line_capacity.max(1);
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dir: PathBuf::from("."),
            capacity: DEFAULT_CAPACITY,
            line_capacity: DEFAULT_LINE_CAPACITY,
            period: DEFAULT_PERIOD,
        }
    }
}
