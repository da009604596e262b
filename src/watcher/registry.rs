//! Live registry of watched directories.
//!
//! Maps watched path ↔ watch descriptor, enforcing one active watch per
//! path. Both the scanner thread and the event-processing path mutate the
//! registry concurrently, so all access goes through one internal mutex;
//! the lock is held across the backend register/unregister call so the
//! one-watch-per-path invariant holds under concurrent adds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::WatchError;
use super::inotify::{Inotify, WatchDescriptor, WatchMask};

/// Registry of path ↔ descriptor mappings for all currently watched
/// directories.
///
/// At any instant the paths in the registry are exactly the directories
/// the backend has a live watch for, up to the unavoidable window between
/// a directory being created and its watch landing.
#[derive(Debug)]
pub struct WatchSet {
    inotify: Arc<Inotify>,
    mask: WatchMask,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_path: HashMap<PathBuf, WatchDescriptor>,
    by_wd: HashMap<i32, PathBuf>,
}

impl WatchSet {
    /// Create an empty registry that registers watches on `inotify` with
    /// `mask`.
    ///
    /// `ONLYDIR` is OR'd into every registration: only directories are
    /// ever watched, and a path swapped for a file between discovery and
    /// registration must fail cleanly rather than watch the file.
    pub fn new(inotify: Arc<Inotify>, mask: WatchMask) -> Self {
        Self {
            inotify,
            mask: mask | WatchMask::ONLYDIR,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register a watch for `path`, inserting it into the registry.
    ///
    /// Idempotent per path: an already-watched path returns its existing
    /// descriptor without touching the backend. Registration failure
    /// (vanished path, permission denied) is non-fatal for callers, who
    /// log and continue without the path.
    pub fn add(&self, path: &Path) -> Result<WatchDescriptor, WatchError> {
        let mut inner = self.inner.lock();
        if let Some(&wd) = inner.by_path.get(path) {
            return Ok(wd);
        }

        let wd = self
            .inotify
            .add_watch(path, self.mask)
            .map_err(|source| WatchError::Register {
                path: path.to_path_buf(),
                source,
            })?;

        // The kernel hands back the same descriptor for the same inode, so
        // a directory re-appearing under a new name reuses an old entry's
        // descriptor. The fresh path wins; the stale one is dropped.
        if let Some(stale) = inner.by_wd.insert(wd.as_raw(), path.to_path_buf()) {
            inner.by_path.remove(&stale);
        }
        inner.by_path.insert(path.to_path_buf(), wd);
        Ok(wd)
    }

    /// Remove the watch for `path`, if one exists.
    ///
    /// Returns false when no entry matches — deletions race with watch-set
    /// updates, so an absent path is a no-op, not an error. A backend
    /// unregister failure is logged and the entry is discarded anyway; the
    /// kernel drops watches on deleted directories on its own.
    pub fn remove(&self, path: &Path) -> bool {
        let mut inner = self.inner.lock();
        let Some(wd) = inner.by_path.remove(path) else {
            return false;
        };
        inner.by_wd.remove(&wd.as_raw());

        if let Err(e) = self.inotify.rm_watch(wd) {
            tracing::debug!(
                "watch for {} already gone from backend: {e}",
                path.display()
            );
        }
        true
    }

    /// Drop the entry for `wd` without a backend call.
    ///
    /// Used when the kernel reports the watch already removed (`IGNORED`).
    /// Returns the path the descriptor was registered for.
    pub fn evict(&self, wd: i32) -> Option<PathBuf> {
        let mut inner = self.inner.lock();
        let path = inner.by_wd.remove(&wd)?;
        inner.by_path.remove(&path);
        Some(path)
    }

    /// Resolve a descriptor back to its watched path.
    ///
    /// Called for every decoded record; unknown descriptors mean the watch
    /// was just removed and the record should be dropped.
    pub fn resolve(&self, wd: i32) -> Option<PathBuf> {
        self.inner.lock().by_wd.get(&wd).cloned()
    }

    /// Unregister and discard every entry. Teardown only.
    pub fn drain_all(&self) {
        let mut inner = self.inner.lock();
        for (path, wd) in inner.by_path.drain() {
            if let Err(e) = self.inotify.rm_watch(wd) {
                tracing::debug!("watch for {} already gone: {e}", path.display());
            }
        }
        inner.by_wd.clear();
    }

    /// Check if a path is currently watched.
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().by_path.contains_key(path)
    }

    /// Snapshot of all watched paths.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.inner.lock().by_path.keys().cloned().collect()
    }

    /// Number of live watches.
    pub fn len(&self) -> usize {
        self.inner.lock().by_path.len()
    }

    /// True when nothing is watched.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().by_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch_set() -> WatchSet {
        let inotify = Arc::new(Inotify::init().expect("inotify init"));
        WatchSet::new(inotify, WatchMask::CREATE | WatchMask::DELETE)
    }

    #[test]
    fn test_add_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let watches = watch_set();

        let wd = watches.add(dir.path()).unwrap();

        assert_eq!(watches.resolve(wd.as_raw()), Some(dir.path().to_path_buf()));
        assert!(watches.contains(dir.path()));
        assert_eq!(watches.len(), 1);
    }

    #[test]
    fn test_add_is_idempotent_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let watches = watch_set();

        let first = watches.add(dir.path()).unwrap();
        let second = watches.add(dir.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(watches.len(), 1);
    }

    #[test]
    fn test_add_vanished_path_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        let watches = watch_set();

        let err = watches.add(&gone).unwrap_err();
        assert!(matches!(err, WatchError::Register { .. }));
        assert!(watches.is_empty());
    }

    #[test]
    fn test_remove_absent_path_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let watches = watch_set();

        assert!(!watches.remove(dir.path()));

        watches.add(dir.path()).unwrap();
        assert!(watches.remove(dir.path()));
        // Second removal finds nothing.
        assert!(!watches.remove(dir.path()));
        assert!(watches.is_empty());
    }

    #[test]
    fn test_evict_drops_entry_without_backend_call() {
        let dir = tempfile::tempdir().unwrap();
        let watches = watch_set();

        let wd = watches.add(dir.path()).unwrap();
        let path = watches.evict(wd.as_raw());

        assert_eq!(path, Some(dir.path().to_path_buf()));
        assert!(watches.resolve(wd.as_raw()).is_none());
        assert!(watches.is_empty());
    }

    #[test]
    fn test_drain_all_empties_registry() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::create_dir(&a).unwrap();
        std::fs::create_dir(&b).unwrap();

        let watches = watch_set();
        watches.add(dir.path()).unwrap();
        watches.add(&a).unwrap();
        watches.add(&b).unwrap();
        assert_eq!(watches.len(), 3);

        watches.drain_all();
        assert!(watches.is_empty());
    }
}
