//! Docroot sandboxing.
//!
//! Every path the pipeline touches (category dirs, matched files, partials)
//! must resolve to a descendant of the docroot.

use std::path::{Component, Path, PathBuf};

use crate::error::{GuideError, Result};

/// Join `relative` onto `root`, rejecting anything that could leave `root`.
///
/// Checks:
/// 1. No `..`, root or prefix components in the raw input
/// 2. If the joined path exists, its canonical form is still under the
///    canonical root (catches symlinks pointing outside)
///
/// A non-existent target is returned lexically joined.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf> {
    if has_escaping_component(Path::new(relative)) {
        return Err(GuideError::PathEscape {
            path: PathBuf::from(relative),
        });
    }

    let joined = root.join(relative);
    if !joined.exists() {
        return Ok(joined);
    }

    let canonical = joined.canonicalize()?;
    if !is_within(root, &canonical) {
        return Err(GuideError::PathEscape { path: joined });
    }
    Ok(canonical)
}

/// True when `path` (already canonical) lies under `root`.
pub fn is_within(root: &Path, path: &Path) -> bool {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    path.starts_with(&root)
}

pub fn has_escaping_component(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_rejects_parent_and_absolute() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            resolve_within(tmp.path(), "../etc"),
            Err(GuideError::PathEscape { .. })
        ));
        assert!(matches!(
            resolve_within(tmp.path(), "docs/../../etc"),
            Err(GuideError::PathEscape { .. })
        ));
        assert!(matches!(
            resolve_within(tmp.path(), "/etc/passwd"),
            Err(GuideError::PathEscape { .. })
        ));
    }

    #[test]
    fn test_accepts_descendant() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("docs/api")).unwrap();
        let resolved = resolve_within(tmp.path(), "docs/api").unwrap();
        assert!(resolved.ends_with("docs/api"));

        // Missing paths resolve lexically.
        let missing = resolve_within(tmp.path(), "nope").unwrap();
        assert!(missing.ends_with("nope"));
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_out_of_root() {
        let outside = tempfile::TempDir::new().unwrap();
        let root = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        assert!(matches!(
            resolve_within(root.path(), "link"),
            Err(GuideError::PathEscape { .. })
        ));
    }

    #[test]
    fn test_to_slash() {
        let path: PathBuf = ["a", "b", "c.md"].iter().collect();
        assert_eq!(to_slash(&path), "a/b/c.md");
    }
}
