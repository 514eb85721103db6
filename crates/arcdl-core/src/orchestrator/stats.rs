//! Aggregate counters for one run.

use crate::metadata::FileRecord;
use crate::transfer::TransferOutcome;

/// A file that failed, with its human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub name: String,
    pub reason: String,
}

/// Counters updated after every outcome. Sizes of files with unknown size
/// contribute 0 to `total_bytes_expected`, so the total can be understated.
/// Byte counters saturate; declared sizes come from untrusted metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub total_files: usize,
    pub total_bytes_expected: u64,
    pub bytes_already_present: u64,
    pub bytes_downloaded: u64,
    pub present: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// In list order.
    pub failures: Vec<FailedFile>,
}

impl RunStatistics {
    pub fn new(files: &[FileRecord]) -> Self {
        Self {
            total_files: files.len(),
            total_bytes_expected: files.iter().map(|f| f.size).fold(0, u64::saturating_add),
            ..Self::default()
        }
    }

    pub fn record(&mut self, record: &FileRecord, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::AlreadyPresent { bytes } => {
                self.present += 1;
                self.bytes_already_present = self.bytes_already_present.saturating_add(*bytes);
            }
            TransferOutcome::Downloaded { bytes } => {
                self.succeeded += 1;
                self.bytes_downloaded = self.bytes_downloaded.saturating_add(*bytes);
            }
            TransferOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(FailedFile {
                    name: record.name.clone(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    /// Files with an outcome so far.
    pub fn processed_files(&self) -> usize {
        self.present + self.succeeded + self.failed
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_already_present.saturating_add(self.bytes_downloaded)
    }

    /// Fraction of expected bytes done, clamped to 1.0; 0 when nothing is expected.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes_expected == 0 {
            return 0.0;
        }
        (self.bytes_done() as f64 / self.total_bytes_expected as f64).min(1.0)
    }
}
