//! Thin safe wrapper over the Linux inotify syscalls.
//!
//! Owns the notification-source descriptor and exposes exactly the four
//! operations the engine needs: init, add watch, remove watch, and a raw
//! read into a caller buffer. Decoding the records that come out of that
//! read lives in [`super::batch`], not here.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use bitflags::bitflags;

bitflags! {
    /// Event kinds a watch registers interest in.
    ///
    /// Passed to [`Inotify::add_watch`]. The values are the kernel `IN_*`
    /// constants, so `bits()` round-trips with the raw API.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WatchMask: u32 {
        /// File was accessed.
        const ACCESS = libc::IN_ACCESS;
        /// Metadata changed.
        const ATTRIB = libc::IN_ATTRIB;
        /// File opened for writing was closed.
        const CLOSE_WRITE = libc::IN_CLOSE_WRITE;
        /// File or directory not opened for writing was closed.
        const CLOSE_NOWRITE = libc::IN_CLOSE_NOWRITE;
        /// Entry created in a watched directory.
        const CREATE = libc::IN_CREATE;
        /// Entry deleted from a watched directory.
        const DELETE = libc::IN_DELETE;
        /// The watched directory itself was deleted.
        const DELETE_SELF = libc::IN_DELETE_SELF;
        /// File was modified.
        const MODIFY = libc::IN_MODIFY;
        /// The watched directory itself was moved.
        const MOVE_SELF = libc::IN_MOVE_SELF;
        /// Entry moved out of a watched directory.
        const MOVED_FROM = libc::IN_MOVED_FROM;
        /// Entry moved into a watched directory.
        const MOVED_TO = libc::IN_MOVED_TO;
        /// File or directory was opened.
        const OPEN = libc::IN_OPEN;
        /// Both `MOVED_FROM` and `MOVED_TO`.
        const MOVE = libc::IN_MOVE;
        /// Both `CLOSE_WRITE` and `CLOSE_NOWRITE`.
        const CLOSE = libc::IN_CLOSE;
        /// Every event kind.
        const ALL_EVENTS = libc::IN_ALL_EVENTS;
        /// Fail registration unless the path is a directory.
        const ONLYDIR = libc::IN_ONLYDIR;
        /// Don't dereference the path if it is a symlink.
        const DONT_FOLLOW = libc::IN_DONT_FOLLOW;
        /// Don't report events for entries unlinked from the directory.
        const EXCL_UNLINK = libc::IN_EXCL_UNLINK;
    }
}

bitflags! {
    /// Event kinds as they appear on decoded records.
    ///
    /// A superset of [`WatchMask`]: the kernel adds reader-only bits
    /// (`ISDIR`, `IGNORED`, `Q_OVERFLOW`, `UNMOUNT`) that can never be
    /// registered for. Listeners receive this mask verbatim; `bits()` is
    /// the raw kernel value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const ACCESS = libc::IN_ACCESS;
        const ATTRIB = libc::IN_ATTRIB;
        const CLOSE_WRITE = libc::IN_CLOSE_WRITE;
        const CLOSE_NOWRITE = libc::IN_CLOSE_NOWRITE;
        const CREATE = libc::IN_CREATE;
        const DELETE = libc::IN_DELETE;
        const DELETE_SELF = libc::IN_DELETE_SELF;
        const MODIFY = libc::IN_MODIFY;
        const MOVE_SELF = libc::IN_MOVE_SELF;
        const MOVED_FROM = libc::IN_MOVED_FROM;
        const MOVED_TO = libc::IN_MOVED_TO;
        const OPEN = libc::IN_OPEN;
        /// The watch was removed, either explicitly or by the kernel.
        const IGNORED = libc::IN_IGNORED;
        /// Subject of the event is a directory.
        const ISDIR = libc::IN_ISDIR;
        /// The kernel event queue overflowed; records were lost.
        const Q_OVERFLOW = libc::IN_Q_OVERFLOW;
        /// Filesystem containing the watched object was unmounted.
        const UNMOUNT = libc::IN_UNMOUNT;
    }
}

/// Opaque identifier for one registered watch.
///
/// Returned by [`Inotify::add_watch`]; the same value arrives on every
/// record the watch produces, which is how records are resolved back to
/// paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchDescriptor(i32);

impl WatchDescriptor {
    /// The kernel-level descriptor value.
    pub fn as_raw(self) -> i32 {
        self.0
    }
}

/// An inotify instance: the notification source.
///
/// The descriptor is opened non-blocking and close-on-exec; it is closed
/// exactly once, when the instance drops.
#[derive(Debug)]
pub struct Inotify {
    fd: OwnedFd,
}

impl Inotify {
    /// Create a new inotify instance.
    pub fn init() -> io::Result<Self> {
        // Non-blocking so the event loop can drain until WouldBlock;
        // close-on-exec so the descriptor never leaks into children.
        let fd = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Register a watch on `path` for the kinds in `mask`.
    ///
    /// Registering the same inode twice yields the same descriptor with a
    /// replaced mask, per inotify semantics.
    pub fn add_watch(&self, path: &Path, mask: WatchMask) -> io::Result<WatchDescriptor> {
        let c_path = CString::new(path.as_os_str().as_bytes())?;
        let wd = unsafe {
            libc::inotify_add_watch(self.fd.as_raw_fd(), c_path.as_ptr(), mask.bits())
        };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(WatchDescriptor(wd))
    }

    /// Unregister a watch.
    ///
    /// Fails with `EINVAL` when the kernel already dropped the watch
    /// (deleted directory); callers treat that as non-fatal.
    pub fn rm_watch(&self, wd: WatchDescriptor) -> io::Result<()> {
        let rc = unsafe { libc::inotify_rm_watch(self.fd.as_raw_fd(), wd.0) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// One `read(2)` from the notification source into `buf`.
    ///
    /// Returns the number of bytes read; `WouldBlock` once the queue is
    /// drained.
    pub fn read_into(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast(),
                buf.len(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl AsRawFd for Inotify {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_and_watch_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inotify = Inotify::init().unwrap();

        let wd = inotify
            .add_watch(dir.path(), WatchMask::CREATE | WatchMask::DELETE)
            .unwrap();
        assert!(wd.as_raw() > 0);

        inotify.rm_watch(wd).unwrap();
    }

    #[test]
    fn test_add_watch_missing_path_fails() {
        let inotify = Inotify::init().unwrap();
        let err = inotify
            .add_watch(Path::new("/nonexistent/treewatch/test"), WatchMask::CREATE)
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_onlydir_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        let inotify = Inotify::init().unwrap();
        let result = inotify.add_watch(&file, WatchMask::CREATE | WatchMask::ONLYDIR);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_would_block_when_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let inotify = Inotify::init().unwrap();
        inotify.add_watch(dir.path(), WatchMask::CREATE).unwrap();

        let mut buf = [0u8; 4096];
        let err = inotify.read_into(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_mask_bits_round_trip() {
        let mask = WatchMask::CREATE | WatchMask::DELETE;
        assert_eq!(mask.bits(), libc::IN_CREATE | libc::IN_DELETE);
        assert!(EventMask::from_bits_retain(libc::IN_CREATE | libc::IN_ISDIR).contains(EventMask::ISDIR));
    }
}
