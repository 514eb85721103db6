//! Logging init: a plain-text log file under the XDG state dir, or stderr.
//!
//! Nothing is ever logged to stdout: `arcdl get` redraws its progress line
//! there with `\r`, and an interleaved log line would corrupt it.
//!
//! Filter precedence: `ARCDL_LOG`, then `RUST_LOG`, then [`DEFAULT_FILTER`].

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Pipeline internals at debug, dependencies at info.
pub const DEFAULT_FILTER: &str = "info,arcdl_core=debug,arcdl=debug";

/// Project-specific filter variable; wins over `RUST_LOG`.
pub const FILTER_ENV: &str = "ARCDL_LOG";

const LOG_FILE_NAME: &str = "arcdl.log";

/// Picks the filter directives from the two environment values. Blank
/// values are treated as unset.
fn select_directives(arcdl_log: Option<String>, rust_log: Option<String>) -> String {
    [arcdl_log, rust_log]
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn env_filter() -> EnvFilter {
    let directives = select_directives(std::env::var(FILTER_ENV).ok(), std::env::var("RUST_LOG").ok());
    // A malformed user filter should not cost the user their log.
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Log file writer; each event clones the handle, falling back to stderr
/// if the clone fails (fd exhaustion).
struct LogFile(fs::File);

enum LogSink {
    File(fs::File),
    Stderr,
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.0.try_clone().map(LogSink::File).unwrap_or(LogSink::Stderr)
    }
}

/// `$XDG_STATE_HOME/arcdl/arcdl.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("arcdl")?;
    Ok(dirs.get_state_home().join("arcdl").join(LOG_FILE_NAME))
}

/// Opens (appending) the log file at `path`, creating its directory.
fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Initialize logging to [`log_file_path`]. On failure (e.g. the state dir is
/// read-only) returns Err so the caller can use [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let path = log_file_path()?;
    let file = open_log_file(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(BoxMakeWriter::new(LogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install log subscriber: {}", e))?;

    tracing::info!(path = %path.display(), "arcdl logging initialized");
    Ok(())
}

/// Logging to stderr only, same filter. Never fails; a second init is ignored.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
