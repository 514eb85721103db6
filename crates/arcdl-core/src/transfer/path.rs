//! Mapping remote file names onto paths under the destination directory.

use std::path::{Component, Path, PathBuf};

/// Returns `name` as a relative path when it stays inside the destination:
/// only normal components (separators kept, `.` ignored). Empty names,
/// absolute paths and `..` are refused.
pub fn safe_relative_path(name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.contains('\0') {
        return None;
    }
    let mut out = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}
