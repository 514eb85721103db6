//! Item identifier extraction from command-line input.

use anyhow::{bail, Result};

/// Path segments after which the archive places the item identifier.
const ID_MARKERS: &[&str] = &["details", "download", "metadata"];

/// Accepts a bare identifier (`karous-eng`) or an archive URL
/// (`https://archive.org/details/karous-eng`) and returns the identifier.
///
/// For URLs the segment following `details`, `download` or `metadata` wins;
/// otherwise the second path segment, falling back to the first.
pub fn parse_item_id(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        bail!("empty item identifier");
    }
    if !input.starts_with("http://") && !input.starts_with("https://") {
        return Ok(input.trim_matches('/').to_string());
    }

    let parsed = url::Url::parse(input).map_err(|e| anyhow::anyhow!("invalid URL {}: {}", input, e))?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let candidate = segments
        .iter()
        .position(|seg| ID_MARKERS.contains(seg))
        .and_then(|i| segments.get(i + 1))
        .or_else(|| segments.get(1))
        .or_else(|| segments.first());

    match candidate {
        Some(id) => Ok(id.to_string()),
        None => bail!("no item identifier in URL: {}", input),
    }
}
