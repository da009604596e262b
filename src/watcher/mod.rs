//! Recursive watch-set engine.
//!
//! Watches a root directory and every directory beneath it, keeps the
//! watch set synchronized as directories are created and deleted, and
//! delivers one listener callback per decoded notification record.
//!
//! # Architecture
//!
//! ```text
//! Watcher::watch(root, mask, listener)
//!     |
//!     +-- scanner thread ----> WatchSet <---- event loop (caller thread)
//!     |   initial tree walk       |              |
//!     |                      Inotify fd     mio::Poll + Waker
//!     |                                          |
//!     |                              batch decode -> per-record:
//!     |                                resolve wd, maintain watches,
//!     +-- joined at teardown            invoke listener
//! ```
//!
//! The scanner and the event loop mutate the [`WatchSet`] concurrently;
//! its internal mutex is the only synchronization point. Stop requests go
//! through a [`StopHandle`], which wakes the loop so shutdown does not
//! wait for filesystem activity.

mod batch;
mod engine;
mod error;
mod handler;
mod inotify;
mod registry;
mod scanner;

pub use batch::{Batch, EventRecord, decode_batch};
pub use engine::{StopHandle, Watcher};
pub use error::WatchError;
pub use handler::EventListener;
pub use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask};
pub use registry::WatchSet;
pub use scanner::scan_tree;
