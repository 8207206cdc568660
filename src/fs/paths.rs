//! Pure path arithmetic shared by the tree store, expansion tracker and
//! reconciliation engine. Nothing in here touches the disk.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` components, fold `..` into the
/// preceding component and strip any trailing separator.
///
/// Symlinks are not resolved; two paths that normalize to the same value are
/// treated as the same tree node everywhere in the crate.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Whether `path` is `root` itself or lies somewhere beneath it.
pub fn is_within(path: &Path, root: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(root))
}

/// Directory that contains `path`. The root of a filesystem is its own parent.
pub fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}

/// Display name of a path (its last component), falling back to the whole path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Ordered list of directories strictly between `root` and `file_path`.
///
/// `root` itself and the file are both excluded. Paths outside `root`
/// produce an empty list.
pub fn expand_ancestors_of(file_path: &Path, root: &Path) -> Vec<PathBuf> {
    let file_path = normalize_path(file_path);
    let root = normalize_path(root);
    let Ok(relative) = file_path.strip_prefix(&root) else {
        return Vec::new();
    };

    let segments: Vec<Component> = relative.components().collect();
    let mut current = root;
    let mut ancestors = Vec::with_capacity(segments.len().saturating_sub(1));
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push(segment);
        ancestors.push(current.clone());
    }
    ancestors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_cur_dir_and_folds_parent() {
        assert_eq!(
            normalize_path(Path::new("/proj/./src/../lib/mod.rs")),
            PathBuf::from("/proj/lib/mod.rs")
        );
    }

    #[test]
    fn normalize_strips_trailing_separator() {
        assert_eq!(normalize_path(Path::new("/proj/src/")), PathBuf::from("/proj/src"));
    }

    #[test]
    fn ancestors_between_root_and_file() {
        let ancestors = expand_ancestors_of(Path::new("/proj/a/b/c.txt"), Path::new("/proj"));
        assert_eq!(
            ancestors,
            vec![PathBuf::from("/proj/a"), PathBuf::from("/proj/a/b")]
        );
    }

    #[test]
    fn ancestors_of_top_level_file_is_empty() {
        assert!(expand_ancestors_of(Path::new("/proj/a.txt"), Path::new("/proj")).is_empty());
    }

    #[test]
    fn ancestors_outside_root_is_empty() {
        assert!(expand_ancestors_of(Path::new("/other/a/b.txt"), Path::new("/proj")).is_empty());
    }

    #[test]
    fn ancestors_ignore_unnormalized_input() {
        let ancestors = expand_ancestors_of(Path::new("/proj/./a/x/../b/c.txt"), Path::new("/proj/"));
        assert_eq!(
            ancestors,
            vec![PathBuf::from("/proj/a"), PathBuf::from("/proj/a/b")]
        );
    }

    #[test]
    fn is_within_requires_whole_components() {
        assert!(is_within(Path::new("/proj/src/main.rs"), Path::new("/proj")));
        assert!(is_within(Path::new("/proj"), Path::new("/proj")));
        assert!(!is_within(Path::new("/project2/main.rs"), Path::new("/proj")));
    }

    #[test]
    fn parent_and_display_name() {
        assert_eq!(parent_dir(Path::new("/proj/a.txt")), PathBuf::from("/proj"));
        assert_eq!(display_name(Path::new("/proj/a.txt")), "a.txt");
    }
}
