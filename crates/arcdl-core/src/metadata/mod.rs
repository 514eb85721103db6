//! Item metadata: the ordered list of files with name, size and digest.
//!
//! `MetadataProvider` is the seam the orchestrator consumes;
//! `ArchiveMetadataClient` implements it against the archive's metadata API.

mod client;
mod parse;

pub use client::ArchiveMetadataClient;
pub use parse::parse_metadata;

use crate::checksum::ExpectedDigest;

/// Immutable descriptor of one remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the item root; may contain `/`.
    pub name: String,
    /// Declared size in bytes; 0 means unknown.
    pub size: u64,
    /// Chosen digest (MD5 > SHA1 > CRC32), if the service published any.
    pub digest: Option<ExpectedDigest>,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, size: u64, digest: Option<ExpectedDigest>) -> Self {
        Self {
            name: name.into(),
            size,
            digest,
        }
    }

    pub fn size_known(&self) -> bool {
        self.size > 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("error fetching metadata: {0}")]
    Transport(#[from] curl::Error),
    #[error("error fetching metadata: HTTP {0}")]
    HttpStatus(crate::http::StatusLine),
    #[error("error parsing metadata: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("item not found or has no file list: {0}")]
    ItemNotFound(String),
    #[error("metadata worker failed: {0}")]
    Worker(String),
}

/// Supplies the file list of an item, in the order the service returns it.
pub trait MetadataProvider: Send + Sync {
    fn get_files(&self, item_id: &str) -> Result<Vec<FileRecord>, MetadataError>;
}
