//! Path helpers for package-relative locations.
//!
//! Config files name chain files relative to the package root; every
//! component works with the resolved absolute form.

use std::path::{Path, PathBuf};

/// Join `path` onto `root` unless it is already absolute.
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Normalize path, falling back to the original if canonicalization fails.
///
/// This is useful when the path might not exist and that's acceptable.
pub fn normalize_or_original(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// `path` relative to `root` for display, or `path` itself if it lies outside.
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_under() {
        let root = Path::new("/pkg");
        assert_eq!(
            resolve_under(root, Path::new("Data/a.sh")),
            PathBuf::from("/pkg/Data/a.sh")
        );
        assert_eq!(
            resolve_under(root, Path::new("/abs/b.sh")),
            PathBuf::from("/abs/b.sh")
        );
    }

    #[test]
    fn test_normalize_or_original_existing() {
        let temp = TempDir::new().unwrap();
        let normalized = normalize_or_original(temp.path());
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_normalize_or_original_missing() {
        let missing = Path::new("/definitely/not/here");
        assert_eq!(normalize_or_original(missing), missing);
    }

    #[test]
    fn test_display_relative() {
        let root = Path::new("/pkg");
        assert_eq!(
            display_relative(root, Path::new("/pkg/Meta/1.0.0.mnf")),
            "Meta/1.0.0.mnf"
        );
        assert_eq!(display_relative(root, Path::new("/elsewhere/x")), "/elsewhere/x");
    }
}
