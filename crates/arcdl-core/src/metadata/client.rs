//! Metadata API client over curl.

use super::{parse_metadata, FileRecord, MetadataError, MetadataProvider};
use crate::config::ArchiveEndpoints;
use crate::http;

/// Fetches `<metadata_base_url><item>/` and parses its file list.
#[derive(Debug, Clone)]
pub struct ArchiveMetadataClient {
    endpoints: ArchiveEndpoints,
}

impl ArchiveMetadataClient {
    pub fn new(endpoints: ArchiveEndpoints) -> Self {
        Self { endpoints }
    }

    pub fn metadata_url(&self, item_id: &str) -> String {
        let base = self.endpoints.metadata_base_url.trim_end_matches('/');
        format!("{}/{}/", base, item_id)
    }
}

impl MetadataProvider for ArchiveMetadataClient {
    fn get_files(&self, item_id: &str) -> Result<Vec<FileRecord>, MetadataError> {
        let url = self.metadata_url(item_id);
        tracing::debug!(%url, "fetching item metadata");
        let response = http::get(&url, &self.endpoints)?;
        if !response.status.is_success() {
            return Err(MetadataError::HttpStatus(response.status));
        }
        let files = parse_metadata(item_id, &response.body)?;
        tracing::debug!(item = item_id, files = files.len(), "metadata parsed");
        Ok(files)
    }
}
