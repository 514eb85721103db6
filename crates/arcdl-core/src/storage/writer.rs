//! Sequential writer for the shared temp file.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::StorageError;

/// Open temp file. Either `finalize`d into place or `discard`ed; a crash
/// leaves it behind for the next run's stale-temp cleanup.
pub(crate) struct TempFile {
    file: File,
    path: PathBuf,
}

impl TempFile {
    /// Create (or truncate) the temp file at `path`.
    pub(crate) fn create(path: &Path) -> Result<Self, StorageError> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| StorageError::io("create temp file", path, source))?;
        Ok(TempFile {
            file,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn write_chunk(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all(data)
            .map_err(|source| StorageError::io("write temp file", &self.path, source))
    }

    /// Flush to disk, close, and rename onto `final_path`. If the rename fails
    /// the temp file is removed and the error surfaced.
    pub(crate) fn finalize(self, final_path: &Path) -> Result<(), StorageError> {
        let TempFile { file, path } = self;
        if let Err(source) = file.sync_all() {
            drop(file);
            remove_if_exists(&path);
            return Err(StorageError::io("sync temp file", &path, source));
        }
        drop(file);

        if let Err(source) = std::fs::rename(&path, final_path) {
            remove_if_exists(&path);
            return Err(StorageError::io("rename temp file to", final_path, source));
        }
        Ok(())
    }

    /// Close and delete the temp file.
    pub(crate) fn discard(self) {
        let TempFile { file, path } = self;
        drop(file);
        remove_if_exists(&path);
    }
}

/// Remove a file, treating "already gone" as success. Returns whether a file was removed.
pub(crate) fn remove_if_exists(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("_.tmp");
        let final_path = dir.path().join("out.bin");

        let mut temp = TempFile::create(&tp).unwrap();
        temp.write_chunk(b"hello ").unwrap();
        temp.write_chunk(b"world").unwrap();
        temp.finalize(&final_path).unwrap();

        assert!(!tp.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"hello world");
    }

    #[test]
    fn discard_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("_.tmp");
        let mut temp = TempFile::create(&tp).unwrap();
        temp.write_chunk(b"partial").unwrap();
        temp.discard();
        assert!(!tp.exists());
    }

    #[test]
    fn failed_rename_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("_.tmp");
        let final_path = dir.path().join("missing-dir").join("out.bin");
        let temp = TempFile::create(&tp).unwrap();
        let err = temp.finalize(&final_path).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(!tp.exists());
        assert!(!final_path.exists());
    }

    #[test]
    fn create_truncates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("_.tmp");
        std::fs::write(&tp, b"stale contents").unwrap();
        let mut temp = TempFile::create(&tp).unwrap();
        temp.write_chunk(b"new").unwrap();
        let final_path = dir.path().join("f");
        temp.finalize(&final_path).unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"new");
    }
}
