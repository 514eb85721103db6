//! Run driver: lists an item's files and processes them one at a time.
//!
//! Each transfer runs on the blocking pool; its progress values come back
//! through a bounded channel that the worker closes when the transfer ends.
//! The directory cache is owned by the run and handed to each worker in turn,
//! which is sound only because files are never processed in parallel.

mod stats;

pub use stats::{FailedFile, RunStatistics};

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::ArchiveEndpoints;
use crate::control::{CancelToken, Cancelled};
use crate::metadata::{ArchiveMetadataClient, FileRecord, MetadataError, MetadataProvider};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::storage::{AtomicFileWriter, DirCache};
use crate::transfer::{CurlFileSource, FileSource, FileTransferTask, TransferOutcome};

/// Capacity of the per-file progress hand-off.
const PROGRESS_QUEUE_DEPTH: usize = 16;

/// `Idle → ListingMetadata → ProcessingFiles → Finalizing → {Completed, Cancelled}`.
/// `Failed` is entered when the file list cannot be obtained or a worker dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    ListingMetadata,
    ProcessingFiles,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::ListingMetadata => "listing_metadata",
            RunPhase::ProcessingFiles => "processing_files",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Completed => "completed",
            RunPhase::Cancelled => "cancelled",
            RunPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Run-level errors. Per-file failures are not errors; they are in the statistics.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("metadata fetch failed")]
    MetadataFetchFailed(#[source] MetadataError),
    #[error("download cancelled")]
    Cancelled,
    #[error("transfer worker failed: {0}")]
    Worker(String),
}

impl From<Cancelled> for RunError {
    fn from(_: Cancelled) -> Self {
        RunError::Cancelled
    }
}

pub struct DownloadOrchestrator {
    metadata: Arc<dyn MetadataProvider>,
    source: Arc<dyn FileSource>,
    download_base_url: String,
    writer: AtomicFileWriter,
    phase: RunPhase,
}

impl DownloadOrchestrator {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        source: Arc<dyn FileSource>,
        download_base_url: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            source,
            download_base_url: download_base_url.into(),
            writer: AtomicFileWriter::new(),
            phase: RunPhase::Idle,
        }
    }

    /// Orchestrator talking to the archive over HTTP.
    pub fn from_endpoints(endpoints: &ArchiveEndpoints) -> Self {
        Self::new(
            Arc::new(ArchiveMetadataClient::new(endpoints.clone())),
            Arc::new(CurlFileSource::new(endpoints.clone())),
            endpoints.download_base_url.clone(),
        )
    }

    pub fn with_writer(mut self, writer: AtomicFileWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: RunPhase) {
        tracing::debug!(from = %self.phase, to = %phase, "run phase");
        self.phase = phase;
    }

    /// Downloads every file of `item_id` into `dest_dir`, in list order.
    ///
    /// Returns the statistics when the loop ran to the end, even if some files
    /// failed. The sink's summary is emitted whenever the loop was entered,
    /// including on cancellation.
    pub async fn run(
        &mut self,
        cancel: &CancelToken,
        item_id: &str,
        dest_dir: &Path,
        verify: bool,
        sink: &dyn ProgressSink,
    ) -> Result<RunStatistics, RunError> {
        self.set_phase(RunPhase::ListingMetadata);
        let files = match self.list_files(item_id).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(item = item_id, error = %e, "could not list item files");
                self.set_phase(RunPhase::Failed);
                return Err(e);
            }
        };

        let mut stats = RunStatistics::new(&files);
        tracing::info!(
            item = item_id,
            files = stats.total_files,
            expected_bytes = stats.total_bytes_expected,
            dest = %dest_dir.display(),
            verify,
            "starting item download"
        );
        sink.on_run_start(item_id, &stats);
        self.set_phase(RunPhase::ProcessingFiles);

        let task = Arc::new(
            FileTransferTask::new(
                Arc::clone(&self.source),
                self.download_base_url.clone(),
                item_id,
                dest_dir,
                verify,
                cancel.clone(),
            )
            .with_writer(self.writer),
        );

        let mut dirs = DirCache::new();
        let mut stopped: Option<RunError> = None;
        for (index, record) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                stopped = Some(RunError::Cancelled);
                break;
            }
            sink.on_file_start(index, record);
            let (result, returned) = match transfer_one(&task, record, dirs, sink).await {
                Ok(r) => r,
                Err(e) => {
                    stopped = Some(e);
                    break;
                }
            };
            dirs = returned;
            match result {
                Ok(outcome) => {
                    stats.record(record, &outcome);
                    sink.on_outcome(record, &outcome, &stats);
                }
                Err(Cancelled) => {
                    stopped = Some(RunError::Cancelled);
                    break;
                }
            }
        }

        self.set_phase(RunPhase::Finalizing);
        sink.on_summary(&stats);

        match stopped {
            None => {
                self.set_phase(RunPhase::Completed);
                Ok(stats)
            }
            Some(RunError::Cancelled) => {
                tracing::info!(
                    item = item_id,
                    processed = stats.processed_files(),
                    total = stats.total_files,
                    "run cancelled"
                );
                self.set_phase(RunPhase::Cancelled);
                Err(RunError::Cancelled)
            }
            Some(e) => {
                tracing::error!(item = item_id, error = %e, "run aborted");
                self.set_phase(RunPhase::Failed);
                Err(e)
            }
        }
    }

    async fn list_files(&self, item_id: &str) -> Result<Vec<FileRecord>, RunError> {
        let provider = Arc::clone(&self.metadata);
        let item = item_id.to_string();
        tokio::task::spawn_blocking(move || provider.get_files(&item))
            .await
            .map_err(|e| RunError::MetadataFetchFailed(MetadataError::Worker(e.to_string())))?
            .map_err(RunError::MetadataFetchFailed)
    }
}

/// Runs one file on the blocking pool and forwards its progress to `sink`
/// until the worker drops its sender. The directory cache travels with the
/// worker and comes back with the result.
async fn transfer_one(
    task: &Arc<FileTransferTask>,
    record: &FileRecord,
    dirs: DirCache,
    sink: &dyn ProgressSink,
) -> Result<(Result<TransferOutcome, Cancelled>, DirCache), RunError> {
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<u64>(PROGRESS_QUEUE_DEPTH);
    let worker_task = Arc::clone(task);
    let worker_record = record.clone();
    let handle = tokio::task::spawn_blocking(move || {
        let mut dirs = dirs;
        let result = worker_task.process(&worker_record, &mut dirs, &mut |bytes| {
            // Receiver only goes away if the run future was dropped.
            let _ = progress_tx.blocking_send(bytes);
        });
        (result, dirs)
    });

    let total_bytes = record.size_known().then_some(record.size);
    while let Some(bytes) = progress_rx.recv().await {
        sink.on_progress(&ProgressEvent {
            file_name: &record.name,
            bytes_transferred: bytes,
            total_bytes,
        });
    }

    handle.await.map_err(|e| RunError::Worker(e.to_string()))
}
