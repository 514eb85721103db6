//! Terminal rendering of a run: header, per-file progress line, summary.

use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use arcdl_core::metadata::FileRecord;
use arcdl_core::orchestrator::RunStatistics;
use arcdl_core::progress::{human_size, ProgressEvent, ProgressSink};
use arcdl_core::transfer::TransferOutcome;

const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

/// Rate-limits progress redraws.
struct RedrawThrottle {
    last: Option<Instant>,
    interval: Duration,
}

impl RedrawThrottle {
    const fn new(interval: Duration) -> Self {
        Self { last: None, interval }
    }

    fn should_draw(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

struct State {
    total_files: usize,
    throttle: RedrawThrottle,
    line_open: bool,
    /// One status line per finished file, for the summary.
    results: Vec<String>,
}

/// `ProgressSink` writing to stdout.
pub struct TerminalSink {
    state: Mutex<State>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                total_files: 0,
                throttle: RedrawThrottle::new(REDRAW_INTERVAL),
                line_open: false,
                results: Vec::new(),
            }),
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut State)) {
        // A panic elsewhere must not silence the summary.
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state);
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalSink {
    fn on_run_start(&self, item_id: &str, stats: &RunStatistics) {
        self.with_state(|state| {
            state.total_files = stats.total_files;
            println!(
                "{}: {} file(s), {}",
                item_id,
                stats.total_files,
                human_size(stats.total_bytes_expected)
            );
        });
    }

    fn on_file_start(&self, index: usize, record: &FileRecord) {
        self.with_state(|state| {
            state.throttle.reset();
            println!("[{}/{}] {}", index + 1, state.total_files, record.name);
        });
    }

    fn on_progress(&self, event: &ProgressEvent<'_>) {
        self.with_state(|state| {
            let last = event.total_bytes == Some(event.bytes_transferred);
            if !state.throttle.should_draw(Instant::now()) && !last {
                return;
            }
            print!("\r  {}  ", progress_line(event));
            let _ = std::io::stdout().flush();
            state.line_open = true;
        });
    }

    fn on_outcome(&self, record: &FileRecord, outcome: &TransferOutcome, stats: &RunStatistics) {
        self.with_state(|state| {
            if state.line_open {
                println!();
                state.line_open = false;
            }
            let status = outcome_label(outcome);
            println!("  {}  ({:.1}% of item)", status, stats.fraction() * 100.0);
            state.results.push(format!("{}: {}", record.name, status));
        });
    }

    fn on_summary(&self, stats: &RunStatistics) {
        self.with_state(|state| {
            if state.line_open {
                println!();
                state.line_open = false;
            }
            println!();
            for line in &state.results {
                println!("  {}", line);
            }
            println!(
                "{} downloaded ({}), {} already present, {} failed",
                stats.succeeded,
                human_size(stats.bytes_downloaded),
                stats.present,
                stats.failed
            );
        });
    }
}

/// `42.0%  1.00 MB / 2.38 MB`, or the raw count when the size is unknown.
fn progress_line(event: &ProgressEvent<'_>) -> String {
    match (event.fraction(), event.total_bytes) {
        (Some(fraction), Some(total)) => format!(
            "{:5.1}%  {} / {}",
            fraction * 100.0,
            human_size(event.bytes_transferred),
            human_size(total)
        ),
        _ => human_size(event.bytes_transferred),
    }
}

fn outcome_label(outcome: &TransferOutcome) -> String {
    match outcome {
        TransferOutcome::AlreadyPresent { bytes } => format!("present ({})", human_size(*bytes)),
        TransferOutcome::Downloaded { bytes } => format!("downloaded ({})", human_size(*bytes)),
        TransferOutcome::Failed(reason) => format!("FAILED: {}", reason),
    }
}
