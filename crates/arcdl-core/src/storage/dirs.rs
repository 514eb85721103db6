//! Memo of destination directories already created during a run.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

/// Directories this run has already ensured exist. Append-only and owned by
/// one orchestrator; transfers borrow it one at a time, so no locking is needed.
#[derive(Debug, Default)]
pub struct DirCache {
    ensured: HashSet<PathBuf>,
}

impl DirCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `dir` (and parents) unless this cache already did. Returns
    /// `true` when a creation call was made.
    pub fn ensure(&mut self, dir: &Path) -> io::Result<bool> {
        if self.ensured.contains(dir) {
            return Ok(false);
        }
        std::fs::create_dir_all(dir)?;
        self.ensured.insert(dir.to_path_buf());
        Ok(true)
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.ensured.contains(dir)
    }
}
