use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures encountered while scanning, checking or reporting.
///
/// Only [`Error::Output`] ends a [`Tracker`](crate::Tracker) run; the other
/// variants concern a single directory listing or entry and are logged and
/// skipped for the current cycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to list directory {}: {source}", .path.display())]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("Failed to stat {}: {source}", .path.display())]
    Stat { path: PathBuf, source: io::Error },
    #[error("Failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl Error {
    /// Whether the error should stop the tracker instead of being skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Output(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_output_is_fatal() {
        let path = PathBuf::from("gone.log");
        let not_found = || io::Error::new(io::ErrorKind::NotFound, "gone");

        assert!(!Error::Stat {
            path: path.clone(),
            source: not_found()
        }
        .is_fatal());
        assert!(!Error::Read {
            path,
            source: not_found()
        }
        .is_fatal());
        assert!(Error::Output(io::Error::new(io::ErrorKind::BrokenPipe, "closed")).is_fatal());
    }

    #[test]
    fn test_display_names_path() {
        let err = Error::Open {
            path: PathBuf::from("some/file.log"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        assert_eq!(err.to_string(), "Failed to open some/file.log: denied");
    }
}
