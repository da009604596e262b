pub mod config;
pub mod logging;
pub mod watcher;

pub use config::{EventKind, Settings};
pub use watcher::{
    EventListener, EventMask, StopHandle, WatchError, WatchMask, WatchSet, Watcher,
};
