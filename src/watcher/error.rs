//! Error types for the watch engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
///
/// Setup variants (`Init`, `Multiplexer`) are fatal: `Watcher::new` aborts
/// and whatever was already acquired is released. `Register` is the one
/// recoverable variant — callers log it and carry on without the path.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to initialize notification source: {source}")]
    Init {
        #[source]
        source: io::Error,
    },

    #[error("failed to set up readiness multiplexer: {source}")]
    Multiplexer {
        #[source]
        source: io::Error,
    },

    #[error("cannot watch {path}: {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("watch root {path} is not a usable directory: {source}")]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch scanner thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },

    #[error("readiness wait failed: {source}")]
    Wait {
        #[source]
        source: io::Error,
    },

    #[error("watcher already ran to completion")]
    Finished,
}
