//! Progress reporting for a run (per-file byte counts, outcomes, summary).
//!
//! The core only emits events; rendering is up to the `ProgressSink` the
//! caller passes in. Sinks are purely observational.

use crate::metadata::FileRecord;
use crate::orchestrator::RunStatistics;
use crate::transfer::TransferOutcome;

/// Running byte count of the file currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent<'a> {
    pub file_name: &'a str,
    /// Bytes written so far; non-decreasing within one file.
    pub bytes_transferred: u64,
    /// Declared size, `None` when the metadata did not publish one.
    pub total_bytes: Option<u64>,
}

impl ProgressEvent<'_> {
    /// Fraction complete in [0.0, 1.0], if the size is known.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total_bytes?;
        if total == 0 {
            return None;
        }
        Some((self.bytes_transferred as f64 / total as f64).min(1.0))
    }
}

/// Receives pipeline events in order: run start, then per file a start,
/// zero or more progress values and one outcome, then the summary.
pub trait ProgressSink: Send + Sync {
    fn on_run_start(&self, _item_id: &str, _stats: &RunStatistics) {}

    /// `index` is the record's zero-based position in the file list.
    fn on_file_start(&self, _index: usize, _record: &FileRecord) {}

    fn on_progress(&self, event: &ProgressEvent<'_>);

    fn on_outcome(&self, _record: &FileRecord, _outcome: &TransferOutcome, _stats: &RunStatistics) {}

    /// Called once after the file loop, however it ended.
    fn on_summary(&self, _stats: &RunStatistics) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _event: &ProgressEvent<'_>) {}
}

/// Emits events as structured `tracing` lines. Progress values go to
/// `trace`, everything else to `info`/`warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_run_start(&self, item_id: &str, stats: &RunStatistics) {
        tracing::info!(
            item = item_id,
            files = stats.total_files,
            expected_bytes = stats.total_bytes_expected,
            "run started"
        );
    }

    fn on_file_start(&self, index: usize, record: &FileRecord) {
        tracing::info!(index, file = %record.name, size = record.size, "file started");
    }

    fn on_progress(&self, event: &ProgressEvent<'_>) {
        tracing::trace!(
            file = event.file_name,
            bytes = event.bytes_transferred,
            total = ?event.total_bytes,
            "progress"
        );
    }

    fn on_outcome(&self, record: &FileRecord, outcome: &TransferOutcome, _stats: &RunStatistics) {
        match outcome {
            TransferOutcome::AlreadyPresent { bytes } => {
                tracing::info!(file = %record.name, bytes, "already present")
            }
            TransferOutcome::Downloaded { bytes } => {
                tracing::info!(file = %record.name, bytes, "downloaded")
            }
            TransferOutcome::Failed(reason) => {
                tracing::warn!(file = %record.name, %reason, "failed")
            }
        }
    }

    fn on_summary(&self, stats: &RunStatistics) {
        tracing::info!(
            present = stats.present,
            downloaded = stats.succeeded,
            failed = stats.failed,
            bytes_downloaded = stats.bytes_downloaded,
            "run finished"
        );
    }
}

const UNITS: [&str; 6] = ["kB", "MB", "GB", "TB", "PB", "EB"];

/// Human-readable size with 1024 steps: `512 B`, `1.50 kB`, `2.00 MB`.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
