//! One file's lifecycle: presence check, streamed fetch, verify, publish.
//!
//! Per-file errors are folded into `TransferOutcome::Failed`; only
//! cancellation escapes, as `Err(Cancelled)`, so the orchestrator can stop.

mod path;
mod source;

pub use path::safe_relative_path;
pub use source::{download_url, CurlFileSource, FileSource};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checksum::{self, DigestKind, ExpectedDigest};
use crate::control::{CancelToken, Cancelled};
use crate::http::OpenError;
use crate::metadata::FileRecord;
use crate::storage::{remove_if_exists, AtomicFileWriter, DirCache, StorageError, TEMP_FILE_NAME};

/// Why a single file could not be fetched. Each carries a readable cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("{0}")]
    Network(String),
    #[error("HTTP error: {code} {reason}")]
    HttpStatus { code: u32, reason: String },
    #[error("checksum verification failed ({0})")]
    ChecksumMismatch(DigestKind),
    #[error("{0}")]
    Filesystem(String),
    /// Internal marker; surfaced to callers as `control::Cancelled`.
    #[error("download cancelled")]
    Cancelled,
}

impl From<StorageError> for TransferError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Cancelled => TransferError::Cancelled,
            StorageError::Source(source) => TransferError::Network(source.to_string()),
            err @ StorageError::Io { .. } => TransferError::Filesystem(err.to_string()),
        }
    }
}

impl From<OpenError> for TransferError {
    fn from(e: OpenError) -> Self {
        match e {
            OpenError::Status(status) => TransferError::HttpStatus {
                code: status.code,
                reason: status.reason,
            },
            other => TransferError::Network(other.to_string()),
        }
    }
}

/// Terminal classification of one file within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// A valid copy was already on disk; `bytes` is its size.
    AlreadyPresent { bytes: u64 },
    Downloaded { bytes: u64 },
    Failed(TransferError),
}

/// Processes files of one item into one destination directory.
pub struct FileTransferTask {
    source: Arc<dyn FileSource>,
    writer: AtomicFileWriter,
    download_base_url: String,
    item_id: String,
    dest_dir: PathBuf,
    verify: bool,
    cancel: CancelToken,
}

impl FileTransferTask {
    pub fn new(
        source: Arc<dyn FileSource>,
        download_base_url: impl Into<String>,
        item_id: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
        verify: bool,
        cancel: CancelToken,
    ) -> Self {
        Self {
            source,
            writer: AtomicFileWriter::new(),
            download_base_url: download_base_url.into(),
            item_id: item_id.into(),
            dest_dir: dest_dir.into(),
            verify,
            cancel,
        }
    }

    pub fn with_writer(mut self, writer: AtomicFileWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Runs the full lifecycle for `record`. `on_progress` receives the
    /// running byte count after every chunk written.
    pub fn process(
        &self,
        record: &FileRecord,
        dirs: &mut DirCache,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<TransferOutcome, Cancelled> {
        match self.try_process(record, dirs, on_progress) {
            Ok(outcome) => Ok(outcome),
            Err(TransferError::Cancelled) => {
                tracing::info!(file = %record.name, "transfer cancelled");
                Err(Cancelled)
            }
            Err(e) => {
                tracing::warn!(file = %record.name, error = %e, "transfer failed");
                Ok(TransferOutcome::Failed(e))
            }
        }
    }

    fn try_process(
        &self,
        record: &FileRecord,
        dirs: &mut DirCache,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<TransferOutcome, TransferError> {
        let relative = safe_relative_path(&record.name)
            .ok_or_else(|| TransferError::Filesystem(format!("unsafe file name: {:?}", record.name)))?;
        // The root temp file would be deleted by the next transfer's stale-temp cleanup.
        if relative == Path::new(TEMP_FILE_NAME) {
            return Err(TransferError::Filesystem(format!(
                "file name {:?} is reserved for the temp file",
                record.name
            )));
        }
        let final_path = self.dest_dir.join(&relative);

        if let Some(bytes) = self.valid_existing(&final_path, record) {
            tracing::debug!(file = %record.name, bytes, "already present");
            return Ok(TransferOutcome::AlreadyPresent { bytes });
        }

        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let url = download_url(&self.download_base_url, &self.item_id, &record.name)?;
        tracing::debug!(file = %record.name, %url, size = record.size, "downloading");
        let mut body = self.source.open(&url)?;

        let bytes = self.writer.write(
            dirs,
            &self.dest_dir,
            &relative,
            &mut *body,
            record.size,
            &self.cancel,
            on_progress,
        )?;

        if self.verify {
            if let Some(digest) = &record.digest {
                verify_or_delete(&final_path, digest)?;
            }
        }
        Ok(TransferOutcome::Downloaded { bytes })
    }

    /// Size of the file at `path` if it can be kept. A copy that fails
    /// verification is deleted so the caller downloads it afresh.
    fn valid_existing(&self, path: &Path, record: &FileRecord) -> Option<u64> {
        let meta = std::fs::metadata(path).ok()?;
        if !meta.is_file() {
            return None;
        }
        if !self.verify {
            return Some(meta.len());
        }
        let Some(digest) = &record.digest else {
            // Nothing published to check against.
            return Some(meta.len());
        };
        match verify_or_delete(path, digest) {
            Ok(()) => Some(meta.len()),
            Err(e) => {
                tracing::info!(file = %record.name, error = %e, "existing copy invalid, re-downloading");
                None
            }
        }
    }
}

/// Verifies `path` against `digest`; deletes the file on mismatch or when it
/// cannot be hashed.
fn verify_or_delete(path: &Path, digest: &ExpectedDigest) -> Result<(), TransferError> {
    match checksum::verify(path, digest) {
        Ok(true) => Ok(()),
        Ok(false) => {
            remove_if_exists(path);
            Err(TransferError::ChecksumMismatch(digest.kind))
        }
        Err(e) => {
            remove_if_exists(path);
            Err(TransferError::Filesystem(e.to_string()))
        }
    }
}
