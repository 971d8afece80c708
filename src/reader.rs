//! Everything related to incrementally reading a tracked file.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::Error;

type LineReader = BufReader<File>;

/// Opens `path` positioned at its current end, so that only content appended
/// afterwards is ever read. Returns the reader and that end offset.
async fn new_linereader(path: &Path, line_capacity: usize) -> io::Result<(LineReader, u64)> {
    let mut file = File::open(path).await?;
    let end = file.seek(io::SeekFrom::End(0)).await?;
    let reader = BufReader::with_capacity(line_capacity, file);

    Ok((reader, end))
}

/// Length of the next chunk to emit from `buf`: up to and including the first
/// newline within `line_capacity` bytes, otherwise as much as fits.
fn chunk_len(buf: &[u8], line_capacity: usize) -> usize {
    let window = &buf[..buf.len().min(line_capacity)];

    match window.iter().position(|&b| b == b'\n') {
        Some(newline) => newline + 1,
        None => window.len(),
    }
}

/// A regular file discovered in the watched directory.
///
/// The entry owns its read handle for its whole lifetime. The handle is opened
/// once, at discovery, and is never reopened; dropping the entry closes it.
pub struct TrackedFile {
    name: OsString,
    path: PathBuf,
    last_modified: SystemTime,
    reader: LineReader,
    line_capacity: usize,
    /// Bytes of the file consumed so far, including what existed at discovery.
    offset: u64,
    /// Set while re-stat'ing the path fails.
    missing: bool,
}

impl fmt::Debug for TrackedFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("TrackedFile")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("last_modified", &self.last_modified)
            .field("offset", &self.offset)
            .field("missing", &self.missing)
            .finish()
    }
}

impl TrackedFile {
    /// Opens `dir/name` at its end, remembering `last_modified` as the
    /// modification time observed when it was discovered.
    pub async fn open(
        dir: &Path,
        name: impl Into<OsString>,
        last_modified: SystemTime,
        line_capacity: usize,
    ) -> Result<Self, Error> {
        let name = name.into();
        let path = dir.join(&name);
        let line_capacity = line_capacity.max(1);

        let (reader, offset) = new_linereader(&path, line_capacity)
            .await
            .map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?;

        Ok(TrackedFile {
            name,
            path,
            last_modified,
            reader,
            line_capacity,
            offset,
            missing: false,
        })
    }

    /// File name as listed in the directory.
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Path used to stat the file, the directory joined with the name.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Position of the handle, which is where the next read resumes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the last attempt to stat the path failed.
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Records that the path could not be stat'ed. Returns `true` only for the
    /// first failure in a row.
    pub fn mark_missing(&mut self) -> bool {
        !std::mem::replace(&mut self.missing, true)
    }

    /// Records `modified` if it is strictly newer than the stored time, and
    /// clears the missing mark.
    ///
    /// Returns `true` when the file should be read.
    pub fn refresh(&mut self, modified: SystemTime) -> bool {
        self.missing = false;
        if modified > self.last_modified {
            self.last_modified = modified;
            true
        } else {
            false
        }
    }

    /// Copies everything currently available after the handle's position to
    /// `out`, one line buffer fill at a time, and returns the byte count.
    ///
    /// Lines longer than the line buffer are written in several chunks. The
    /// handle is left right after the last byte written so the next call
    /// resumes from there.
    pub async fn drain<W>(&mut self, out: &mut W) -> Result<u64, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut written = 0;

        loop {
            let buf = self.reader.fill_buf().await.map_err(|source| Error::Read {
                path: self.path.clone(),
                source,
            })?;
            if buf.is_empty() {
                break;
            }

            let len = chunk_len(buf, self.line_capacity);
            out.write_all(&buf[..len]).await.map_err(Error::Output)?;

            self.reader.consume(len);
            self.offset += len as u64;
            written += len as u64;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::fs::OpenOptions;

    /// Records every write call separately.
    #[derive(Default)]
    struct ChunkSink(Vec<Vec<u8>>);

    impl AsyncWrite for ChunkSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut task::Context<'_>,
            buf: &[u8],
        ) -> task::Poll<io::Result<usize>> {
            self.0.push(buf.to_vec());
            task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut task::Context<'_>,
        ) -> task::Poll<io::Result<()>> {
            task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut task::Context<'_>,
        ) -> task::Poll<io::Result<()>> {
            task::Poll::Ready(Ok(()))
        }
    }

    async fn append(path: &Path, data: &[u8]) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .await
            .expect("Failed to open for append");
        file.write_all(data).await.unwrap();
        file.sync_all().await.unwrap();
    }

    #[test]
    fn test_chunk_len() {
        assert_eq!(chunk_len(b"foo\nbar\n", 1024), 4);
        assert_eq!(chunk_len(b"no newline yet", 1024), 14);
        assert_eq!(chunk_len(b"abcdef\n", 4), 4);
        assert_eq!(chunk_len(b"abc\n", 4), 4);
        assert_eq!(chunk_len(b"\n", 1), 1);
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let tmp_dir = tempdir().expect("Failed to create tempdir");

        let res = TrackedFile::open(tmp_dir.path(), "missing.log", SystemTime::now(), 1024).await;
        assert!(matches!(res, Err(Error::Open { .. })));
    }

    #[tokio::test]
    async fn test_existing_content_is_skipped() {
        let tmp_dir = tempdir().expect("Failed to create tempdir");
        let path = tmp_dir.path().join("a.txt");
        std::fs::write(&path, b"hello\n").unwrap();

        let mut tracked = TrackedFile::open(tmp_dir.path(), "a.txt", SystemTime::now(), 1024)
            .await
            .unwrap();
        assert_eq!(tracked.name(), OsStr::new("a.txt"));
        assert_eq!(tracked.path(), path.as_path());
        assert_eq!(tracked.offset(), 6);

        let mut out: Vec<u8> = Vec::new();
        assert_eq!(tracked.drain(&mut out).await.unwrap(), 0);
        assert!(out.is_empty());

        append(&path, b"world\n").await;
        assert_eq!(tracked.drain(&mut out).await.unwrap(), 6);
        assert_eq!(out, b"world\n");
        assert_eq!(tracked.offset(), 12);
    }

    #[tokio::test]
    async fn test_drain_resumes_after_partial_line() {
        let tmp_dir = tempdir().expect("Failed to create tempdir");
        let path = tmp_dir.path().join("partial.log");
        std::fs::write(&path, b"").unwrap();

        let mut tracked = TrackedFile::open(tmp_dir.path(), "partial.log", SystemTime::now(), 1024)
            .await
            .unwrap();

        let mut out: Vec<u8> = Vec::new();
        append(&path, b"foo ").await;
        tracked.drain(&mut out).await.unwrap();
        append(&path, b"bar\nbaz\n").await;
        tracked.drain(&mut out).await.unwrap();

        assert_eq!(out, b"foo bar\nbaz\n");
    }

    #[tokio::test]
    async fn test_long_line_is_chunked() {
        let tmp_dir = tempdir().expect("Failed to create tempdir");
        let path = tmp_dir.path().join("long.log");
        std::fs::write(&path, b"").unwrap();

        let mut tracked = TrackedFile::open(tmp_dir.path(), "long.log", SystemTime::now(), 1024)
            .await
            .unwrap();

        let mut line = vec![b'x'; 2000];
        line.push(b'\n');
        append(&path, &line).await;

        let mut out = ChunkSink::default();
        assert_eq!(tracked.drain(&mut out).await.unwrap(), 2001);
        let chunks = out.0;

        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.len() <= 1024));
        assert_eq!(chunks.concat(), line);
    }

    #[tokio::test]
    async fn test_refresh_requires_newer_time() {
        let tmp_dir = tempdir().expect("Failed to create tempdir");
        std::fs::write(tmp_dir.path().join("t.log"), b"").unwrap();

        let discovered = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut tracked = TrackedFile::open(tmp_dir.path(), "t.log", discovered, 1024)
            .await
            .unwrap();

        assert!(tracked.mark_missing());
        assert!(!tracked.mark_missing());
        assert!(tracked.is_missing());

        assert!(!tracked.refresh(discovered));
        assert!(!tracked.is_missing());
        assert!(tracked.mark_missing());
        assert!(!tracked.refresh(discovered - Duration::from_secs(1)));
        assert!(tracked.refresh(discovered + Duration::from_secs(1)));
        assert_eq!(tracked.last_modified(), discovered + Duration::from_secs(1));
    }
}
