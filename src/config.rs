//! Configuration for the treewatch daemon.
//!
//! Layered: defaults, then a TOML file, then environment overrides.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `TREEWATCH_` and use double underscores to
//! separate nested levels:
//! - `TREEWATCH_ROOT=/srv/data` sets `root`
//! - `TREEWATCH_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::watcher::WatchMask;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "treewatch.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory tree to watch
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Event kinds reported to the listener
    #[serde(default = "default_events")]
    pub events: Vec<EventKind>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event kinds a watch can be configured to report.
///
/// Maps one-to-one onto the backend's registerable mask bits. Create and
/// delete are always registered regardless of this list — the engine needs
/// them for its own watch-set bookkeeping.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum EventKind {
    Create,
    Delete,
    Modify,
    Attrib,
    Open,
    CloseWrite,
    CloseNowrite,
    MovedFrom,
    MovedTo,
}

impl EventKind {
    /// The backend mask bit for this kind.
    pub fn mask(self) -> WatchMask {
        match self {
            EventKind::Create => WatchMask::CREATE,
            EventKind::Delete => WatchMask::DELETE,
            EventKind::Modify => WatchMask::MODIFY,
            EventKind::Attrib => WatchMask::ATTRIB,
            EventKind::Open => WatchMask::OPEN,
            EventKind::CloseWrite => WatchMask::CLOSE_WRITE,
            EventKind::CloseNowrite => WatchMask::CLOSE_NOWRITE,
            EventKind::MovedFrom => WatchMask::MOVED_FROM,
            EventKind::MovedTo => WatchMask::MOVED_TO,
        }
    }
}

/// Combine a list of kinds into one registration mask.
pub fn mask_for(kinds: &[EventKind]) -> WatchMask {
    kinds
        .iter()
        .fold(WatchMask::empty(), |mask, kind| mask | kind.mask())
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module log level overrides
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_events() -> Vec<EventKind> {
    vec![EventKind::Create, EventKind::Delete]
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            root: default_root(),
            events: default_events(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings: defaults, merged with `config_path` (or
    /// `treewatch.toml` next to the working directory), merged with
    /// `TREEWATCH_*` environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let file = config_path.unwrap_or(Path::new(CONFIG_FILE));
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("TREEWATCH_").split("__"))
            .extract()
    }

    /// The registration mask the configured event kinds add up to.
    pub fn watch_mask(&self) -> WatchMask {
        mask_for(&self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.root, PathBuf::from("."));
        assert_eq!(settings.events, vec![EventKind::Create, EventKind::Delete]);
        assert_eq!(settings.logging.default, "info");
    }

    #[test]
    fn test_default_mask_is_create_delete() {
        let settings = Settings::default();
        assert_eq!(
            settings.watch_mask(),
            WatchMask::CREATE | WatchMask::DELETE
        );
    }

    #[test]
    fn test_mask_for_combines_kinds() {
        let mask = mask_for(&[EventKind::Modify, EventKind::CloseWrite, EventKind::Attrib]);
        assert!(mask.contains(WatchMask::MODIFY));
        assert!(mask.contains(WatchMask::CLOSE_WRITE));
        assert!(mask.contains(WatchMask::ATTRIB));
        assert!(!mask.contains(WatchMask::CREATE));
    }

    #[test]
    fn test_settings_survive_toml_round_trip() {
        let settings = Settings::default();
        let text = toml::to_string(&settings).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.events, settings.events);
        assert_eq!(back.root, settings.root);
    }
}
