//! A library and binary tailing every regular file in a directory, like
//! `tail -f` pointed at the directory itself.
//!
//! The directory is polled: each cycle lists it to capture files that showed
//! up since the last cycle, then re-stats every captured file and copies
//! whatever was appended to it, verbatim, to the output. Content that already
//! existed when a file was captured is never replayed.
//!
//! ## Example
//!
//! ```no_run
//! use dirtail::{Config, Pause, Tracker};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), dirtail::Error> {
//!     let config = Config::default().with_dir("/var/log/myapp");
//!     let period = config.period;
//!
//!     let mut tracker = Tracker::stdio(config);
//!
//!     // Poll once per period until Ctrl-C, then close every file.
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     tracker.run(Pause::new(period), shutdown).await
//! }
//! ```
//!
//! ## Caveats
//!
//! Tracked files are never released. A file that is deleted, rotated or
//! replaced under the same name keeps its original handle, so content written
//! to the new file is not picked up. Once the capacity is reached, further
//! files are not tracked for the lifetime of the [`Tracker`].

mod config;
mod error;
mod reader;
mod tick;
mod tracker;

pub use config::{Config, DEFAULT_CAPACITY, DEFAULT_LINE_CAPACITY, DEFAULT_PERIOD};
pub use error::Error;
pub use reader::TrackedFile;
pub use tick::Pause;
pub use tracker::Tracker;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
