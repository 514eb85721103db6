//! Download-and-verify pipeline for archive.org items.
//!
//! `orchestrator::DownloadOrchestrator` lists an item's files and, one at a
//! time, skips valid local copies, streams the rest to disk with atomic
//! publish, and verifies them against the published digest.

pub mod checksum;
pub mod config;
pub mod control;
pub mod http;
pub mod item;
pub mod logging;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod storage;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;
