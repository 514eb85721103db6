//! CLI for the arcdl item downloader.

mod commands;
mod terminal;

use anyhow::Result;
use arcdl_core::config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_checksum, run_get, run_list};

/// Exit status of a run stopped by Ctrl-C / SIGTERM.
pub const EXIT_CANCELLED: i32 = 130;

/// Top-level CLI for arcdl.
#[derive(Debug, Parser)]
#[command(name = "arcdl")]
#[command(about = "arcdl: download and verify archive.org items", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every file of an item, skipping files already present and valid.
    Get {
        /// Item identifier or archive.org URL.
        item: String,
        /// Destination directory (default: `default_destination` from the config).
        dest: Option<PathBuf>,
        /// Do not verify checksums of existing or downloaded files.
        #[arg(long)]
        no_checksum: bool,
        /// No progress display; events go to the log only.
        #[arg(long, short)]
        quiet: bool,
    },

    /// List the files of an item with size and checksum.
    List {
        /// Item identifier or archive.org URL.
        item: String,
    },

    /// Compute (and optionally check) a file's digest.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// Digest algorithm: md5, sha1 or crc32.
        #[arg(long, default_value = "md5")]
        algo: String,
        /// Expected hex digest; exit status 1 on mismatch.
        #[arg(long, value_name = "HEX")]
        expect: Option<String>,
    },
}

impl CliCommand {
    /// Parses arguments, loads the config and dispatches. Returns the process exit status.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                item,
                dest,
                no_checksum,
                quiet,
            } => {
                let dest = dest.unwrap_or_else(|| cfg.default_destination.clone());
                let verify = cfg.verify_checksums && !no_checksum;
                run_get(&cfg, &item, &dest, verify, quiet).await
            }
            CliCommand::List { item } => run_list(&cfg, &item).await.map(|()| 0),
            CliCommand::Checksum { path, algo, expect } => {
                run_checksum(&path, &algo, expect.as_deref()).await
            }
        }
    }
}
