//! `arcdl list` – print an item's file list.

use anyhow::{Context, Result};
use arcdl_core::config::ArcdlConfig;
use arcdl_core::item;
use arcdl_core::metadata::{ArchiveMetadataClient, MetadataProvider};
use arcdl_core::progress::human_size;

pub async fn run_list(cfg: &ArcdlConfig, item_arg: &str) -> Result<()> {
    let item_id = item::parse_item_id(item_arg)?;
    let client = ArchiveMetadataClient::new(cfg.endpoints());
    let id = item_id.clone();
    let files = tokio::task::spawn_blocking(move || client.get_files(&id))
        .await
        .context("metadata worker failed")?
        .with_context(|| format!("listing {}", item_id))?;

    let mut total = 0u64;
    for f in &files {
        total += f.size;
        let size = if f.size_known() {
            human_size(f.size)
        } else {
            "?".to_string()
        };
        let digest = f
            .digest
            .as_ref()
            .map(|d| format!("{}:{}", d.kind, d.value))
            .unwrap_or_else(|| "-".to_string());
        println!("{:>10}  {}  {}", size, digest, f.name);
    }
    println!("{} file(s), {}", files.len(), human_size(total));
    Ok(())
}
