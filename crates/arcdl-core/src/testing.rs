//! In-memory stand-ins for the network seams, shared by unit tests.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Mutex;

use md5::{Digest, Md5};

use crate::control::CancelToken;
use crate::metadata::{FileRecord, MetadataError, MetadataProvider};
use crate::transfer::{download_url, FileSource, TransferError};

pub(crate) const TEST_DOWNLOAD_BASE: &str = "http://archive.test/download/";

pub(crate) fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Scripted response for one download URL.
#[derive(Clone)]
pub(crate) enum Canned {
    Body(Vec<u8>),
    Status(u32, String),
    /// Delivers the bytes, then fails with a connection reset.
    Truncated(Vec<u8>),
    /// Cancels the token on the first read, after returning data.
    CancelAfterFirstRead(Vec<u8>, CancelToken),
}

impl Canned {
    pub(crate) fn body(data: &[u8]) -> Self {
        Canned::Body(data.to_vec())
    }

    pub(crate) fn status(code: u32, reason: &str) -> Self {
        Canned::Status(code, reason.to_string())
    }

    pub(crate) fn truncated(data: &[u8]) -> Self {
        Canned::Truncated(data.to_vec())
    }

    pub(crate) fn cancel_after_first_read(data: &[u8], token: &CancelToken) -> Self {
        Canned::CancelAfterFirstRead(data.to_vec(), token.clone())
    }
}

#[derive(Default)]
pub(crate) struct MemorySource {
    responses: HashMap<String, Canned>,
    opened: Mutex<Vec<String>>,
}

impl MemorySource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_file(mut self, item_id: &str, name: &str, canned: Canned) -> Self {
        let url = download_url(TEST_DOWNLOAD_BASE, item_id, name).unwrap();
        self.responses.insert(url, canned);
        self
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

impl FileSource for MemorySource {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransferError> {
        self.opened.lock().unwrap().push(url.to_string());
        let reader = match self.responses.get(url).cloned() {
            None => {
                return Err(TransferError::HttpStatus {
                    code: 404,
                    reason: "Not Found".to_string(),
                })
            }
            Some(Canned::Status(code, reason)) => return Err(TransferError::HttpStatus { code, reason }),
            Some(Canned::Body(data)) => ScriptedReader::new(data),
            Some(Canned::Truncated(data)) => ScriptedReader {
                fail_at_end: true,
                ..ScriptedReader::new(data)
            },
            Some(Canned::CancelAfterFirstRead(data, token)) => ScriptedReader {
                cancel_on_read: Some(token),
                ..ScriptedReader::new(data)
            },
        };
        Ok(Box::new(reader))
    }
}

struct ScriptedReader {
    data: Vec<u8>,
    pos: usize,
    fail_at_end: bool,
    cancel_on_read: Option<CancelToken>,
}

impl ScriptedReader {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            fail_at_end: false,
            cancel_on_read: None,
        }
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(token) = &self.cancel_on_read {
            token.cancel();
        }
        if self.pos >= self.data.len() {
            if self.fail_at_end {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"));
            }
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Metadata provider answering with a fixed listing, or a fixed failure.
pub(crate) struct StaticMetadata {
    files: Option<Vec<FileRecord>>,
}

impl StaticMetadata {
    pub(crate) fn new(files: Vec<FileRecord>) -> Self {
        Self { files: Some(files) }
    }

    pub(crate) fn not_found() -> Self {
        Self { files: None }
    }
}

impl MetadataProvider for StaticMetadata {
    fn get_files(&self, item_id: &str) -> Result<Vec<FileRecord>, MetadataError> {
        self.files
            .clone()
            .ok_or_else(|| MetadataError::ItemNotFound(item_id.to_string()))
    }
}
