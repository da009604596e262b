use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use treewatch::config::{CONFIG_FILE, mask_for};
use treewatch::{EventKind, EventMask, Settings, Watcher, logging};

#[derive(Parser)]
#[command(name = "treewatch")]
#[command(version, about = "Watch a directory tree and report every change")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory tree until interrupted
    Watch {
        /// Root directory to watch (overrides config)
        root: Option<PathBuf>,

        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Event kinds to report (overrides config)
        #[arg(long, value_delimiter = ',')]
        events: Vec<EventKind>,
    },

    /// Show the effective configuration
    Config {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            root,
            config,
            events,
        } => run_watch(root, config.as_deref(), &events),
        Commands::Config { config } => show_config(config.as_deref()),
        Commands::Init { force } => write_default_config(force),
    }
}

fn run_watch(
    root: Option<PathBuf>,
    config: Option<&Path>,
    events: &[EventKind],
) -> Result<()> {
    let settings = Settings::load(config).context("failed to load configuration")?;
    logging::init_with_config(&settings.logging);

    let root = root.unwrap_or_else(|| settings.root.clone());
    let mask = if events.is_empty() {
        settings.watch_mask()
    } else {
        mask_for(events)
    };

    let mut watcher = Watcher::new().context("failed to set up watcher")?;

    let handle = watcher.handle();
    ctrlc::set_handler(move || {
        treewatch::log_event!("signal", "stop requested");
        handle.request_stop();
    })
    .context("failed to install signal handler")?;

    watcher
        .watch(&root, mask, |path: &Path, mask: EventMask| {
            treewatch::log_event!("event", "change", "{} ({mask:?})", path.display());
        })
        .with_context(|| format!("watch on {} failed", root.display()))?;

    Ok(())
}

fn show_config(config: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config).context("failed to load configuration")?;
    let text = toml::to_string_pretty(&settings).context("failed to render configuration")?;
    print!("{text}");
    Ok(())
}

fn write_default_config(force: bool) -> Result<()> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() && !force {
        bail!("{CONFIG_FILE} already exists (use --force to overwrite)");
    }

    let text = toml::to_string_pretty(&Settings::default())
        .context("failed to render default configuration")?;
    fs::write(path, text).with_context(|| format!("failed to write {CONFIG_FILE}"))?;
    println!("Wrote {CONFIG_FILE}");
    Ok(())
}
