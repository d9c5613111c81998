//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Remove a file or a directory tree, if it exists.
///
/// Returns `true` when something was removed.
pub fn remove_path_if_exists(path: &Path) -> Result<bool> {
    // symlink_metadata so a dangling link still counts as present
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(false);
    };

    if meta.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    } else {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display()))?;
    }
    Ok(true)
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_path_if_exists_handles_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("out");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/file.txt"), "x").unwrap();
        let file = tmp.path().join("app.spec");
        fs::write(&file, "spec").unwrap();

        assert!(remove_path_if_exists(&dir).unwrap());
        assert!(remove_path_if_exists(&file).unwrap());
        assert!(!dir.exists());
        assert!(!file.exists());

        // Second pass has nothing left to remove
        assert!(!remove_path_if_exists(&dir).unwrap());
        assert!(!remove_path_if_exists(&file).unwrap());
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/project");
        assert_eq!(
            resolve_path(base, Path::new("assets")),
            PathBuf::from("/project/assets")
        );
        #[cfg(unix)]
        assert_eq!(resolve_path(base, Path::new("/abs")), PathBuf::from("/abs"));
    }
}
