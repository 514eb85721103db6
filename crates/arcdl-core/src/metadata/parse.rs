//! Parse the metadata API's JSON document into file records.

use serde::{Deserialize, Deserializer};

use super::{FileRecord, MetadataError};
use crate::checksum::{DigestKind, ExpectedDigest};

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    #[serde(default)]
    files: Option<Vec<RawFile>>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    name: String,
    #[serde(default, deserialize_with = "lenient_size")]
    size: u64,
    #[serde(default)]
    md5: Option<String>,
    #[serde(default)]
    sha1: Option<String>,
    #[serde(default)]
    crc32: Option<String>,
}

/// The service sends sizes as strings ("1234"), occasionally as numbers, and
/// sometimes not at all. Anything unusable counts as unknown (0).
fn lenient_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawFile {
    fn into_record(self) -> FileRecord {
        let digest = non_empty(self.md5)
            .map(|v| ExpectedDigest::new(DigestKind::Md5, v))
            .or_else(|| non_empty(self.sha1).map(|v| ExpectedDigest::new(DigestKind::Sha1, v)))
            .or_else(|| non_empty(self.crc32).map(|v| ExpectedDigest::new(DigestKind::Crc32, v)));
        FileRecord {
            name: self.name,
            size: self.size,
            digest,
        }
    }
}

/// Parse a metadata response body. A document without a `files` key is what
/// the service returns for unknown identifiers and maps to `ItemNotFound`.
pub fn parse_metadata(item_id: &str, body: &[u8]) -> Result<Vec<FileRecord>, MetadataError> {
    let doc: MetadataDocument = serde_json::from_slice(body)?;
    let files = doc
        .files
        .ok_or_else(|| MetadataError::ItemNotFound(item_id.to_string()))?;
    Ok(files.into_iter().map(RawFile::into_record).collect())
}
