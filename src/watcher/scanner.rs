//! Initial and incremental directory-tree scans.
//!
//! Walks a subtree and registers a watch for every directory found,
//! including the root of the walk. The walk is best-effort: a directory
//! that cannot be opened or registered is logged and skipped, and the walk
//! never aborts on a single failure.

use std::path::Path;

use walkdir::WalkDir;

use super::registry::WatchSet;

/// Register watches for `root` and every directory beneath it.
///
/// Each directory's watch is registered when the walk yields it — before
/// its children are read — so entries created inside it mid-walk land in
/// an already-watched parent. Files are never watched individually (the
/// backend reports in-directory events without per-file registration) and
/// symlinks are not followed. Returns the number of directories whose
/// watch is live after the walk.
pub fn scan_tree(watches: &WatchSet, root: &Path) -> usize {
    let mut registered = 0;

    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| e.file_type().is_dir()) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable directory during scan: {e}");
                continue;
            }
        };

        match watches.add(entry.path()) {
            Ok(_) => {
                crate::debug_event!("scanner", "watching", "{}", entry.path().display());
                registered += 1;
            }
            Err(e) => {
                // Raced with a deletion or lost permissions mid-walk; the
                // path simply stays absent from the watch set.
                tracing::warn!("{e}");
            }
        }
    }

    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::inotify::{Inotify, WatchMask};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn watch_set() -> WatchSet {
        let inotify = Arc::new(Inotify::init().expect("inotify init"));
        WatchSet::new(inotify, WatchMask::CREATE | WatchMask::DELETE)
    }

    #[test]
    fn test_scan_registers_every_directory_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("a/d")).unwrap();
        fs::create_dir(root.join("e")).unwrap();
        fs::write(root.join("a/file.txt"), b"not a dir").unwrap();
        fs::write(root.join("e/another"), b"").unwrap();

        let watches = watch_set();
        let registered = scan_tree(&watches, root);

        let mut expected: Vec<PathBuf> = vec![
            root.to_path_buf(),
            root.join("a"),
            root.join("a/b"),
            root.join("a/b/c"),
            root.join("a/d"),
            root.join("e"),
        ];
        expected.sort();

        let mut scanned = watches.paths();
        scanned.sort();

        assert_eq!(scanned, expected);
        assert_eq!(registered, expected.len());
    }

    #[test]
    fn test_scan_skips_files_and_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("real")).unwrap();
        fs::write(root.join("plain"), b"").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

        let watches = watch_set();
        scan_tree(&watches, root);

        assert!(watches.contains(root));
        assert!(watches.contains(&root.join("real")));
        assert!(!watches.contains(&root.join("plain")));
        assert!(!watches.contains(&root.join("link")));
        assert_eq!(watches.len(), 2);
    }

    #[test]
    fn test_scan_missing_root_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never-created");

        let watches = watch_set();
        let registered = scan_tree(&watches, &gone);

        assert_eq!(registered, 0);
        assert!(watches.is_empty());
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();

        let watches = watch_set();
        scan_tree(&watches, dir.path());
        let first = watches.len();
        scan_tree(&watches, dir.path());

        assert_eq!(watches.len(), first);
    }
}
