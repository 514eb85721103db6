//! Disk I/O and file lifecycle.
//!
//! A transfer streams into one temp file per destination directory
//! (`<dest>/_.tmp`) and is published by renaming it onto the final path, so a
//! final path is either absent or complete. Only one transfer may be in flight
//! per destination directory.

mod dirs;
mod writer;

pub use dirs::DirCache;
pub(crate) use writer::remove_if_exists;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::control::CancelToken;
use writer::TempFile;

/// Temp file name shared by all transfers into one destination directory.
pub const TEMP_FILE_NAME: &str = "_.tmp";

/// Copy chunk size.
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Path of the shared temp file for `dest_dir`.
pub fn temp_path(dest_dir: &Path) -> PathBuf {
    dest_dir.join(TEMP_FILE_NAME)
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("download cancelled")]
    Cancelled,
    /// Reading the byte source failed (network side).
    #[error("{0}")]
    Source(#[source] io::Error),
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Streams a byte source into the destination directory's temp file and
/// publishes it under its final name at end of stream.
#[derive(Debug, Clone, Copy)]
pub struct AtomicFileWriter {
    chunk_size: usize,
}

impl Default for AtomicFileWriter {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }
}

impl AtomicFileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Copy `source` to `dest_dir/name` via the temp file.
    ///
    /// `expected_size` is the declared size (0 = unknown); it only selects the
    /// read strategy. `on_progress` receives the running byte total after every
    /// chunk written. Cancellation is checked before each chunk read. On any
    /// error the temp file is removed and the final path is left untouched.
    /// Returns the number of bytes written.
    pub fn write<R: Read + ?Sized>(
        &self,
        dirs: &mut DirCache,
        dest_dir: &Path,
        name: &Path,
        source: &mut R,
        expected_size: u64,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, StorageError> {
        let temp = temp_path(dest_dir);
        let final_path = dest_dir.join(name);

        if remove_if_exists(&temp) {
            tracing::debug!(path = %temp.display(), "removed stale temp file");
        }
        let parent = final_path.parent().unwrap_or(dest_dir);
        dirs.ensure(parent)
            .map_err(|source| StorageError::io("create directory", parent, source))?;

        let mut out = TempFile::create(&temp)?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                out.discard();
                return Err(StorageError::Cancelled);
            }

            let remaining = expected_size.saturating_sub(written);
            let full = expected_size > 0 && remaining >= self.chunk_size as u64;
            let (n, eof) = match read_chunk(source, &mut buf, full) {
                Ok(r) => r,
                Err(e) => {
                    out.discard();
                    return Err(StorageError::Source(e));
                }
            };

            if n > 0 {
                if let Err(e) = out.write_chunk(&buf[..n]) {
                    out.discard();
                    return Err(e);
                }
                written += n as u64;
                on_progress(written);
            }

            if eof {
                out.finalize(&final_path)?;
                return Ok(written);
            }
        }
    }
}

/// Reads one chunk. With `full`, keeps reading until `buf` is full; a short
/// chunk is only accepted when the stream ends. Otherwise a single best-effort
/// read. Returns `(bytes, end_of_stream)`.
fn read_chunk<R: Read + ?Sized>(source: &mut R, buf: &mut [u8], full: bool) -> io::Result<(usize, bool)> {
    if !full {
        loop {
            match source.read(buf) {
                Ok(n) => return Ok((n, n == 0)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => return Ok((filled, true)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok((filled, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Yields `data` in pieces of at most `piece` bytes; optionally errors at the end or cancels after N reads.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        piece: usize,
        fail_at_end: bool,
        cancel_after_reads: Option<(usize, CancelToken)>,
        reads: usize,
    }

    impl Trickle {
        fn new(data: &[u8], piece: usize) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                piece,
                fail_at_end: false,
                cancel_after_reads: None,
                reads: 0,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            if let Some((after, token)) = &self.cancel_after_reads {
                if self.reads >= *after {
                    token.cancel();
                }
            }
            if self.pos >= self.data.len() {
                if self.fail_at_end {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
                }
                return Ok(0);
            }
            let n = buf.len().min(self.piece).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn writes_and_publishes_with_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = DirCache::new();
        let body: Vec<u8> = (0u8..=255).cycle().take(10_000).collect();
        let mut src = Trickle::new(&body, 700);
        let mut seen = Vec::new();

        let n = AtomicFileWriter::with_chunk_size(1024)
            .write(
                &mut dirs,
                dir.path(),
                Path::new("sub/file.bin"),
                &mut src,
                body.len() as u64,
                &CancelToken::new(),
                &mut |t| seen.push(t),
            )
            .unwrap();

        assert_eq!(n, body.len() as u64);
        assert_eq!(std::fs::read(dir.path().join("sub/file.bin")).unwrap(), body);
        assert!(!temp_path(dir.path()).exists());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*seen.last().unwrap(), body.len() as u64);
        // Full reads while at least a chunk remains: the first 9 chunks are exactly 1024 bytes.
        assert_eq!(&seen[..9], &[1024, 2048, 3072, 4096, 5120, 6144, 7168, 8192, 9216]);
    }

    #[test]
    fn unknown_size_uses_partial_reads() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = DirCache::new();
        let mut src = Trickle::new(b"abcdefghij", 3);
        let mut seen = Vec::new();
        let n = AtomicFileWriter::with_chunk_size(1024)
            .write(
                &mut dirs,
                dir.path(),
                Path::new("f"),
                &mut src,
                0,
                &CancelToken::new(),
                &mut |t| seen.push(t),
            )
            .unwrap();
        assert_eq!(n, 10);
        assert_eq!(seen, vec![3, 6, 9, 10]);
    }

    #[test]
    fn removes_stale_temp_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_path(dir.path()), b"left over from a crash").unwrap();
        let mut dirs = DirCache::new();
        AtomicFileWriter::new()
            .write(
                &mut dirs,
                dir.path(),
                Path::new("f"),
                &mut Cursor::new(b"fresh".to_vec()),
                5,
                &CancelToken::new(),
                &mut |_| {},
            )
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("f")).unwrap(), b"fresh");
        assert!(!temp_path(dir.path()).exists());
    }

    #[test]
    fn interrupted_stream_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = DirCache::new();
        let mut src = Trickle::new(&[7u8; 100], 40);
        src.fail_at_end = true;
        let err = AtomicFileWriter::with_chunk_size(64)
            .write(
                &mut dirs,
                dir.path(),
                Path::new("f"),
                &mut src,
                1000,
                &CancelToken::new(),
                &mut |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Source(_)));
        assert!(!dir.path().join("f").exists());
        assert!(!temp_path(dir.path()).exists());
    }

    #[test]
    fn cancellation_discards_temp() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = DirCache::new();
        let token = CancelToken::new();
        let mut src = Trickle::new(&[1u8; 100], 10);
        src.cancel_after_reads = Some((2, token.clone()));
        let mut seen = Vec::new();
        let err = AtomicFileWriter::with_chunk_size(10)
            .write(
                &mut dirs,
                dir.path(),
                Path::new("f"),
                &mut src,
                100,
                &token,
                &mut |t| seen.push(t),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
        assert_eq!(seen, vec![10, 20]);
        assert!(!dir.path().join("f").exists());
        assert!(!temp_path(dir.path()).exists());
    }

    #[test]
    fn short_full_read_at_end_of_stream_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = DirCache::new();
        // Declared larger than delivered: the full-read chunk ends early at EOF.
        let mut src = Trickle::new(&[9u8; 30], 7);
        let n = AtomicFileWriter::with_chunk_size(16)
            .write(
                &mut dirs,
                dir.path(),
                Path::new("f"),
                &mut src,
                64,
                &CancelToken::new(),
                &mut |_| {},
            )
            .unwrap();
        assert_eq!(n, 30);
        assert_eq!(std::fs::read(dir.path().join("f")).unwrap().len(), 30);
    }

    #[test]
    fn empty_stream_publishes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = DirCache::new();
        let mut seen = Vec::new();
        let n = AtomicFileWriter::new()
            .write(
                &mut dirs,
                dir.path(),
                Path::new("empty"),
                &mut io::empty(),
                0,
                &CancelToken::new(),
                &mut |t| seen.push(t),
            )
            .unwrap();
        assert_eq!(n, 0);
        assert!(seen.is_empty());
        assert_eq!(std::fs::metadata(dir.path().join("empty")).unwrap().len(), 0);
    }
}
