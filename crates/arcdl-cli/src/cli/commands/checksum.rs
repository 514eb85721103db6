//! Checksum command: compute or check a file's digest.

use anyhow::{Context, Result};
use arcdl_core::checksum::{self, DigestKind};
use std::path::Path;

/// Prints the digest of `path`. With `expect`, compares instead and returns
/// exit status 1 on mismatch.
pub async fn run_checksum(path: &Path, algo: &str, expect: Option<&str>) -> Result<i32> {
    let kind: DigestKind = algo.parse()?;
    let owned = path.to_path_buf();

    match expect {
        None => {
            let digest = blocking(move || checksum::digest_path(&owned, kind)).await??;
            println!("{}  {}", digest, path.display());
            Ok(0)
        }
        Some(expected) => {
            let expected_owned = expected.to_string();
            let algo_owned = algo.to_string();
            let matches =
                blocking(move || checksum::verify_named(&owned, &algo_owned, &expected_owned)).await??;
            if matches {
                println!("{}: OK ({})", path.display(), kind);
                Ok(0)
            } else {
                println!("{}: MISMATCH ({} expected {})", path.display(), kind, expected.trim());
                Ok(1)
            }
        }
    }
}

/// Hashing reads the whole file; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("checksum worker failed")
}
