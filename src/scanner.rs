// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Recursive discovery of image files

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Walk each root and collect files with one of `extensions`, in a stable
/// (name-sorted, depth-first) order. Symlinked files are included. Missing
/// roots and unreadable entries are skipped with a warning.
pub fn discover(roots: &[PathBuf], extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in roots {
        if !root.is_dir() {
            warn!("Skipping missing directory: {:?}", root);
            continue;
        }

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry {:?}: {}", e.path().unwrap_or(root.as_path()), e);
                    continue;
                }
            };
            let path = entry.path();
            // Follows symlinks, unlike entry.file_type()
            if !path.is_file() {
                continue;
            }
            if should_process(path) && has_extension(path, extensions) {
                files.push(path.to_path_buf());
            } else {
                debug!("Ignoring {:?}", path);
            }
        }
    }

    files
}

/// Case-insensitive extension match
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Check if a file should be processed
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    // Skip hidden files
    if filename.starts_with('.') {
        return false;
    }

    // Skip partial downloads
    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    if temp_extensions.iter().any(|ext| filename.ends_with(ext)) {
        return false;
    }

    // Skip system files
    let skip_names = ["desktop.ini", "thumbs.db", ".ds_store"];
    !skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn exts() -> Vec<String> {
        ["jpg", "jpeg", "png"].into_iter().map(String::from).collect()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("/a/IMG_1.JPG"), &exts()));
        assert!(has_extension(Path::new("/a/b.Jpeg"), &exts()));
        assert!(!has_extension(Path::new("/a/b.gif"), &exts()));
        assert!(!has_extension(Path::new("/a/jpg"), &exts()));
    }

    #[test]
    fn test_should_process() {
        assert!(should_process(Path::new("/a/photo.jpg")));
        assert!(!should_process(Path::new("/a/.hidden.jpg")));
        assert!(!should_process(Path::new("/a/photo.jpg.part")));
        assert!(!should_process(Path::new("/a/Thumbs.db")));
    }

    #[test]
    fn test_discover_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.jpg"));
        touch(&root.join("a.PNG"));
        touch(&root.join("notes.txt"));
        touch(&root.join("anim.gif"));
        touch(&root.join("sub/c.jpeg"));
        touch(&root.join(".cache/d.jpg"));

        let found = discover(&[root.to_path_buf()], &exts());
        assert_eq!(
            found,
            vec![root.join("a.PNG"), root.join("b.jpg"), root.join("sub/c.jpeg")]
        );
    }

    #[test]
    fn test_discover_subdirs_and_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Photos/p.jpg"));
        touch(&root.join("Pictures/q.jpg"));
        touch(&root.join("Other/r.jpg"));

        let roots = vec![root.join("Photos"), root.join("Missing"), root.join("Pictures")];
        let found = discover(&roots, &exts());
        assert_eq!(found, vec![root.join("Photos/p.jpg"), root.join("Pictures/q.jpg")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_follows_file_symlinks() {
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("real.jpg");
        touch(&target);

        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link.jpg");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        std::os::unix::fs::symlink(outside.path().join("gone.jpg"), dir.path().join("dangling.jpg")).unwrap();

        let found = discover(&[dir.path().to_path_buf()], &exts());
        assert_eq!(found, vec![link]);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_continues_past_unreadable_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.jpg"));
        touch(&root.join("locked/b.jpg"));
        touch(&root.join("z.jpg"));
        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits, so only the non-root run hits the error path
        let readable = fs::read_dir(&locked).is_ok();
        let found = discover(&[root.to_path_buf()], &exts());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let mut expected = vec![root.join("a.jpg")];
        if readable {
            expected.push(root.join("locked/b.jpg"));
        }
        expected.push(root.join("z.jpg"));
        assert_eq!(found, expected);
    }
}
