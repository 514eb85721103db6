//! Where file bytes come from: download URL construction and the byte-source seam.

use std::io::Read;

use super::TransferError;
use crate::config::ArchiveEndpoints;
use crate::http::HttpBody;

/// Opens the response body for a download URL. A non-2xx answer is
/// `TransferError::HttpStatus`; transport failures are `Network`.
pub trait FileSource: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransferError>;
}

/// `FileSource` backed by libcurl, sending the archive's required headers.
#[derive(Debug, Clone)]
pub struct CurlFileSource {
    endpoints: ArchiveEndpoints,
}

impl CurlFileSource {
    pub fn new(endpoints: ArchiveEndpoints) -> Self {
        Self { endpoints }
    }
}

impl FileSource for CurlFileSource {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransferError> {
        let body = HttpBody::open(url, &self.endpoints)?;
        Ok(Box::new(body))
    }
}

/// `<base>/<item>/<name>` with `name` escaped as a single path segment
/// (embedded `/` becomes `%2F`).
pub fn download_url(base: &str, item_id: &str, name: &str) -> Result<String, TransferError> {
    let mut url = url::Url::parse(base)
        .map_err(|e| TransferError::Network(format!("invalid download base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| TransferError::Network(format!("download base URL cannot take a path: {}", base)))?
        .pop_if_empty()
        .push(item_id)
        .push(name);
    Ok(url.into())
}
