// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First try a direct `strip_prefix(root)`.
/// - If that fails (symlinks, `/private/var` vs `/var` on macOS), retry with
///   both paths canonicalized.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    // Removed files cannot be canonicalized; fall back to their parent.
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;
    let root_canon = root.canonicalize().ok()?;

    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn strips_root_prefix() {
        let root = PathBuf::from("/project");
        let rel = relative_str(&root, Path::new("/project/app/css/style.css"));
        assert_eq!(rel.as_deref(), Some("app/css/style.css"));
    }

    #[test]
    fn unrelated_path_is_none() {
        let root = PathBuf::from("/definitely/not/here");
        assert!(relative_str(&root, Path::new("/elsewhere/file.css")).is_none());
    }
}
