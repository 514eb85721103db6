//! `arcdl get` – download and verify every file of an item.

use anyhow::Result;
use arcdl_core::config::ArcdlConfig;
use arcdl_core::control::CancelToken;
use arcdl_core::item;
use arcdl_core::orchestrator::{DownloadOrchestrator, RunError};
use arcdl_core::progress::{ProgressSink, TracingSink};
use std::path::Path;

use crate::cli::terminal::TerminalSink;
use crate::cli::EXIT_CANCELLED;

/// With `quiet`, progress goes to the log through `TracingSink` instead of stdout.
pub async fn run_get(cfg: &ArcdlConfig, item_arg: &str, dest: &Path, verify: bool, quiet: bool) -> Result<i32> {
    let item_id = item::parse_item_id(item_arg)?;
    let cancel = CancelToken::new();
    let listener = spawn_interrupt_listener(cancel.clone());

    let sink: Box<dyn ProgressSink> = if quiet {
        Box::new(TracingSink)
    } else {
        Box::new(TerminalSink::new())
    };
    let mut orchestrator = DownloadOrchestrator::from_endpoints(&cfg.endpoints());
    let result = orchestrator.run(&cancel, &item_id, dest, verify, sink.as_ref()).await;
    listener.abort();

    match result {
        Ok(stats) => {
            tracing::info!(
                item = %item_id,
                downloaded = stats.succeeded,
                present = stats.present,
                failed = stats.failed,
                "get finished"
            );
            Ok(0)
        }
        Err(RunError::Cancelled) => {
            eprintln!("Download cancelled.");
            Ok(EXIT_CANCELLED)
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("downloading {}", item_id))),
    }
}

/// Cancels `cancel` on the first SIGINT/SIGTERM. The run stops at the next
/// chunk or file boundary and removes its temp file.
fn spawn_interrupt_listener(cancel: CancelToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_interrupt().await {
            Ok(signal) => {
                tracing::info!(signal, "interrupt received, cancelling run");
                eprintln!("\nInterrupted, stopping...");
                cancel.cancel();
            }
            Err(e) => tracing::warn!("could not install signal handlers: {}", e),
        }
    })
}

async fn wait_for_interrupt() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => Ok("SIGTERM"),
            _ = sigint.recv() => Ok("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}
