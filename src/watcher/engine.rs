//! The watch engine: readiness loop, record processing, stop handling.
//!
//! A [`Watcher`] owns the notification source and a readiness multiplexer
//! with exactly two registered sources: the inotify descriptor and a waker
//! used for prompt stop. [`Watcher::watch`] spawns the initial scan on its
//! own thread and then runs the event loop on the calling thread until a
//! stop is requested, so the caller's context is the one every listener
//! callback executes on.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};
use std::os::fd::AsRawFd;

use crate::log_event;

use super::batch::{EventRecord, decode_batch};
use super::error::WatchError;
use super::handler::EventListener;
use super::inotify::{EventMask, Inotify, WatchMask};
use super::registry::WatchSet;
use super::scanner;

const NOTIFY: Token = Token(0);
const WAKEUP: Token = Token(1);

/// One read can carry many records; 64 KiB holds a few hundred even with
/// maximal names.
const READ_BUF_LEN: usize = 64 * 1024;

/// Where the engine is in its lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Idle,
    Watching,
    Stopped,
}

/// Cancellation handle for a running [`Watcher`].
///
/// Cloneable and cheap; typically handed to a signal handler. Stopping
/// sets the shared flag *and* fires the waker, so a loop blocked on a
/// quiet tree observes the request promptly instead of waiting for the
/// next filesystem event.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl StopHandle {
    /// Ask the event loop to stop after the batch it is currently
    /// processing, if any.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.waker.wake() {
            tracing::warn!("failed to wake event loop for stop: {e}");
        }
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Recursive directory-tree watcher.
///
/// ```no_run
/// use std::path::Path;
/// use treewatch::{EventMask, Watcher, WatchMask};
///
/// let mut watcher = Watcher::new()?;
/// let handle = watcher.handle();
/// ctrlc::set_handler(move || handle.request_stop())?;
///
/// let mask = WatchMask::CREATE | WatchMask::DELETE;
/// watcher.watch("/srv/data", mask, |path: &Path, mask: EventMask| {
///     println!("{} {mask:?}", path.display());
/// })?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Watcher {
    inotify: Arc<Inotify>,
    poll: Poll,
    waker: Arc<Waker>,
    stop: Arc<AtomicBool>,
    state: LoopState,
}

impl Watcher {
    /// Acquire the notification source and readiness multiplexer.
    ///
    /// Fatal setup errors surface here; anything acquired before the
    /// failure is released on the way out.
    pub fn new() -> Result<Self, WatchError> {
        let inotify =
            Arc::new(Inotify::init().map_err(|source| WatchError::Init { source })?);
        let poll = Poll::new().map_err(|source| WatchError::Multiplexer { source })?;
        let waker = Arc::new(
            Waker::new(poll.registry(), WAKEUP)
                .map_err(|source| WatchError::Multiplexer { source })?,
        );

        poll.registry()
            .register(
                &mut SourceFd(&inotify.as_raw_fd()),
                NOTIFY,
                Interest::READABLE,
            )
            .map_err(|source| WatchError::Multiplexer { source })?;

        Ok(Self {
            inotify,
            poll,
            waker,
            stop: Arc::new(AtomicBool::new(false)),
            state: LoopState::Idle,
        })
    }

    /// Get a cancellation handle. Valid before and during [`watch`].
    ///
    /// [`watch`]: Watcher::watch
    pub fn handle(&self) -> StopHandle {
        StopHandle {
            stop: Arc::clone(&self.stop),
            waker: Arc::clone(&self.waker),
        }
    }

    /// Watch `root` and everything beneath it, delivering every record to
    /// `listener` until a stop is requested.
    ///
    /// Blocks the calling thread. The initial scan runs concurrently on
    /// its own thread, so events can arrive while the tree is still being
    /// populated. On return the scan has been joined and all watches have
    /// been released. A watcher runs once; calling this again afterwards
    /// returns [`WatchError::Finished`].
    ///
    /// `CREATE | DELETE` are always OR'd into `mask` — the engine needs
    /// them to keep the watch set synchronized — so the listener may see
    /// kinds it did not ask for and must filter.
    pub fn watch<L>(
        &mut self,
        root: impl AsRef<Path>,
        mask: WatchMask,
        mut listener: L,
    ) -> Result<(), WatchError>
    where
        L: EventListener,
    {
        if self.state != LoopState::Idle {
            return Err(WatchError::Finished);
        }

        let root = root.as_ref();
        let root = std::fs::canonicalize(root).map_err(|source| WatchError::InvalidRoot {
            path: root.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Err(WatchError::InvalidRoot {
                path: root,
                source: io::Error::from_raw_os_error(libc::ENOTDIR),
            });
        }

        let watches = Arc::new(WatchSet::new(
            Arc::clone(&self.inotify),
            mask | WatchMask::CREATE | WatchMask::DELETE,
        ));

        let scan_watches = Arc::clone(&watches);
        let scan_root = root.clone();
        let scan = thread::Builder::new()
            .name("treewatch-scan".to_string())
            .spawn(move || {
                let n = scanner::scan_tree(&scan_watches, &scan_root);
                log_event!("scanner", "initial scan complete", "{n} directories");
            })
            .map_err(|source| WatchError::Spawn { source })?;

        self.state = LoopState::Watching;
        log_event!("watcher", "watching", "{}", root.display());

        let result = self.event_loop(&watches, &mut listener);

        // Teardown order: the scan is not cancellable, so wait for it,
        // then release every watch it and the loop registered.
        if scan.join().is_err() {
            tracing::error!("scanner thread panicked");
        }
        watches.drain_all();
        self.state = LoopState::Stopped;
        log_event!("watcher", "stopped");

        result
    }

    /// Release the notification source and multiplexer.
    ///
    /// Dropping the watcher is equivalent; either way every descriptor is
    /// released exactly once.
    pub fn close(self) {}

    fn event_loop(
        &mut self,
        watches: &WatchSet,
        listener: &mut dyn EventListener,
    ) -> Result<(), WatchError> {
        let mut events = Events::with_capacity(16);
        let mut buf = vec![0u8; READ_BUF_LEN];

        // The stop flag is checked once per wake cycle; request_stop also
        // fires the waker, so a quiet tree still stops promptly.
        while !self.stop.load(Ordering::SeqCst) {
            match self.poll.poll(&mut events, None) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(WatchError::Wait { source }),
                Ok(()) => {}
            }

            for event in events.iter() {
                match event.token() {
                    NOTIFY => self.drain_notifications(watches, &mut buf, listener),
                    WAKEUP => {}
                    other => {
                        // Only the two tokens above are ever registered.
                        tracing::warn!("readiness for unregistered token {other:?}, ignored");
                    }
                }
            }
        }

        Ok(())
    }

    /// Read the notification source dry and process everything it held.
    fn drain_notifications(
        &self,
        watches: &WatchSet,
        buf: &mut [u8],
        listener: &mut dyn EventListener,
    ) {
        loop {
            let n = match self.inotify.read_into(buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    // Abandon this batch; the loop picks up again on the
                    // next readiness wake.
                    tracing::error!("read from notification source failed: {e}");
                    break;
                }
            };

            let batch = decode_batch(&buf[..n]);
            if batch.truncated {
                tracing::warn!("malformed trailing record; dropped tail of batch");
            }
            for record in &batch.records {
                self.process_record(watches, record, listener);
            }
        }
    }

    fn process_record(
        &self,
        watches: &WatchSet,
        record: &EventRecord,
        listener: &mut dyn EventListener,
    ) {
        if record.mask.contains(EventMask::Q_OVERFLOW) {
            tracing::warn!("kernel event queue overflowed; records were lost");
        }

        let Some(parent) = watches.resolve(record.wd) else {
            // The watch was removed between the kernel queuing this record
            // and us reading it.
            tracing::trace!("record for unknown watch {} dropped", record.wd);
            return;
        };

        let full_path = match &record.name {
            Some(name) => parent.join(name),
            None => parent,
        };

        if record.mask.contains(EventMask::IGNORED) {
            // Kernel already removed the watch; keep the registry honest
            // without a doomed rm_watch call.
            watches.evict(record.wd);
        }

        let is_dir = record.mask.contains(EventMask::ISDIR);
        if is_dir && record.mask.contains(EventMask::CREATE) {
            match watches.add(&full_path) {
                Ok(_) => {
                    // A burst like `mkdir -p a/b/c` reports only `a` here;
                    // anything already nested inside needs a scan.
                    scanner::scan_tree(watches, &full_path);
                }
                Err(e) => tracing::debug!("new directory vanished before watch: {e}"),
            }
        } else if is_dir && record.mask.contains(EventMask::DELETE) {
            watches.remove(&full_path);
        }

        listener.on_event(&full_path, record.mask);
    }
}
