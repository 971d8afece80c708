//! Everything related to discovering files in the watched directory and
//! draining the ones that grew.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::path::Path;
use std::time::SystemTime;

use futures_util::pin_mut;
use futures_util::stream::{Stream as FuturesStream, StreamExt};
use tokio::fs::{metadata, read_dir};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stderr, Stdout};
use tracing::{debug, info, warn};

use crate::{Config, Error, TrackedFile};

/// Unwraps a per-entry result, or logs the error and moves on to the next
/// entry. Fatal errors are returned to the caller instead.
macro_rules! ok_or_continue {
    ($res:expr) => {
        match $res {
            Ok(val) => val,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(error = %err, "skipping entry");
                continue;
            }
        }
    };
}

async fn modified(path: &Path) -> Result<SystemTime, Error> {
    metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .map_err(|source| Error::Stat {
            path: path.to_path_buf(),
            source,
        })
}

/// Tails every regular file in a directory.
///
/// Each [`cycle`](Tracker::cycle) first [`scan`](Tracker::scan)s the directory
/// for regular files that are not tracked yet, then [`check`](Tracker::check)s
/// every tracked file and writes whatever was appended to it since the last
/// cycle. Appended content goes to the `out` sink verbatim, and notices about
/// captured and closed files go to the `diag` sink, one line each.
///
/// Files are tracked in the order the directory listing first yields them, up
/// to the configured capacity. Entries are never removed: a file deleted or
/// replaced after discovery keeps its original handle and simply stops
/// producing content.
pub struct Tracker<O = Stdout, D = Stderr> {
    config: Config,
    entries: Vec<TrackedFile>,
    names: HashSet<OsString>,
    out: O,
    diag: D,
}

impl<O, D> Debug for Tracker<O, D> {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("entries", &self.entries)
            .finish()
    }
}

impl Tracker<Stdout, Stderr> {
    /// Tracker writing content to standard output and notices to standard
    /// error.
    pub fn stdio(config: Config) -> Self {
        Self::new(config, tokio::io::stdout(), tokio::io::stderr())
    }
}

impl<O, D> Tracker<O, D>
where
    O: AsyncWrite + Unpin,
    D: AsyncWrite + Unpin,
{
    pub fn new(config: Config, out: O, diag: D) -> Self {
        Tracker {
            entries: Vec::with_capacity(config.capacity),
            names: HashSet::with_capacity(config.capacity),
            config,
            out,
            diag,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Maximum number of files that will be tracked.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked files, in the order they were captured.
    pub fn entries(&self) -> &[TrackedFile] {
        &self.entries
    }

    /// Names of the tracked files, in the order they were captured.
    pub fn names(&self) -> impl Iterator<Item = &OsStr> {
        self.entries.iter().map(TrackedFile::name)
    }

    pub fn is_tracked(&self, name: impl AsRef<OsStr>) -> bool {
        self.names.contains(name.as_ref())
    }

    /// Returns a reference to the content sink.
    pub fn output(&self) -> &O {
        &self.out
    }

    /// Returns a reference to the notice sink.
    pub fn diagnostics(&self) -> &D {
        &self.diag
    }

    /// Returns the content and notice sinks, dropping (and closing) every
    /// tracked file.
    pub fn into_inner(self) -> (O, D) {
        let Tracker { out, diag, .. } = self;

        (out, diag)
    }

    async fn notice(&mut self, mut line: String) -> Result<(), Error> {
        line.push('\n');
        self.diag
            .write_all(line.as_bytes())
            .await
            .map_err(Error::Output)
    }

    /// Lists the directory and starts tracking every regular file not already
    /// tracked, positioned at its end. Returns how many files were captured.
    ///
    /// Once the table is full, the first untracked regular file met ends the
    /// scan with a single capacity notice. Entries that cannot be stat'ed or
    /// opened are skipped and retried on the next scan. A directory that
    /// cannot be listed skips the whole scan.
    pub async fn scan(&mut self) -> Result<usize, Error> {
        let mut dir = match read_dir(&self.config.dir).await {
            Ok(dir) => dir,
            Err(source) => {
                let err = Error::ReadDir {
                    path: self.config.dir.clone(),
                    source,
                };
                warn!(error = %err, "skipping scan");
                return Ok(0);
            }
        };

        let mut captured = 0;

        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    let err = Error::ReadDir {
                        path: self.config.dir.clone(),
                        source,
                    };
                    warn!(error = %err, "directory listing cut short");
                    break;
                }
            };

            let name = entry.file_name();
            if self.names.contains(&name) {
                continue;
            }

            // Not following symlinks here, so links are never captured.
            let file_type = ok_or_continue!(entry.file_type().await.map_err(|source| {
                Error::Stat {
                    path: entry.path(),
                    source,
                }
            }));
            if !file_type.is_file() {
                continue;
            }

            if self.entries.len() >= self.config.capacity {
                info!(capacity = self.config.capacity, "tracking table is full");
                self.notice(format!(
                    "more than max files ({}) in directory",
                    self.config.capacity
                ))
                .await?;
                break;
            }

            let last_modified = ok_or_continue!(modified(&entry.path()).await);
            let tracked = ok_or_continue!(
                TrackedFile::open(
                    &self.config.dir,
                    name.clone(),
                    last_modified,
                    self.config.line_capacity,
                )
                .await
            );

            let shown = name.to_string_lossy().into_owned();
            info!(name = %shown, offset = tracked.offset(), "capturing entry");
            self.notice(format!("capturing entry: {}", shown)).await?;

            self.names.insert(name);
            self.entries.push(tracked);
            captured += 1;
        }

        self.diag.flush().await.map_err(Error::Output)?;

        Ok(captured)
    }

    /// Re-stats every tracked file and, for each one whose modification time
    /// moved forward, writes everything appended since its last read. Returns
    /// the number of bytes written.
    ///
    /// A file that cannot be stat'ed or read is skipped for this cycle.
    pub async fn check(&mut self) -> Result<u64, Error> {
        let mut emitted = 0;

        for entry in self.entries.iter_mut() {
            let mtime = match modified(entry.path()).await {
                Ok(mtime) => mtime,
                Err(err) => {
                    // Deleted files keep failing every cycle; only report the first.
                    if entry.mark_missing() {
                        warn!(error = %err, "skipping entry");
                    } else {
                        debug!(error = %err, "skipping entry");
                    }
                    continue;
                }
            };
            if !entry.refresh(mtime) {
                continue;
            }

            let written = ok_or_continue!(entry.drain(&mut self.out).await);
            debug!(name = ?entry.name(), written, offset = entry.offset(), "drained");
            emitted += written;
        }

        self.out.flush().await.map_err(Error::Output)?;

        Ok(emitted)
    }

    /// One scan followed by one check of every tracked file.
    pub async fn cycle(&mut self) -> Result<(), Error> {
        self.scan().await?;
        self.check().await?;

        Ok(())
    }

    /// Runs cycles until `shutdown` completes or `ticks` ends, waiting for the
    /// next tick between two cycles, then closes every tracked file.
    ///
    /// Shutdown is only observed between cycles and wins over a tick that is
    /// ready at the same time. Only a failure to write to either sink ends
    /// the run early.
    pub async fn run<T, S>(&mut self, ticks: T, shutdown: S) -> Result<(), Error>
    where
        T: FuturesStream,
        S: Future<Output = ()>,
    {
        pin_mut!(ticks);
        pin_mut!(shutdown);

        loop {
            self.cycle().await?;

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                tick = ticks.next() => {
                    if tick.is_none() {
                        debug!("ticks ended");
                        break;
                    }
                }
            }
        }

        self.close_all().await
    }

    /// Closes every tracked file in capture order, writing `<name> closed`
    /// for each, and empties the table.
    pub async fn close_all(&mut self) -> Result<(), Error> {
        let entries = std::mem::take(&mut self.entries);
        self.names.clear();

        for entry in entries {
            let shown = entry.name().to_string_lossy().into_owned();
            drop(entry);

            info!(name = %shown, "closed");
            self.notice(format!("{} closed", shown)).await?;
        }

        self.diag.flush().await.map_err(Error::Output)
    }
}
