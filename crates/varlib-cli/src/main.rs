//! Varlib CLI - command-line host for the varlib package engine.
//!
//! Every subcommand builds one engine over the configured roots, runs a
//! single operation and prints its outcome. Ctrl-C cancels a running batch
//! between items.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use varlib_core::{CancellationToken, PackageEngine, PathsConfig, StorageRoots};

#[derive(Parser, Debug)]
#[command(name = "varlib")]
#[command(about = "Locate, de-duplicate and move .var packages between storage roots")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print outcomes as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Roots configuration file (defaults to <config dir>/varlib/roots.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Loaded root, overrides the configuration file
    #[arg(long, requires = "available_root")]
    loaded_root: Option<PathBuf>,

    /// Available root, overrides the configuration file
    #[arg(long, requires = "loaded_root")]
    available_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List duplicate package files
    Duplicates {
        /// Base names to check (all packages when empty)
        names: Vec<String>,
    },

    /// Delete redundant duplicate copies
    Dedupe {
        /// Base names to resolve (all packages when empty)
        names: Vec<String>,

        /// Keep the copy in this root instead of the default by priority
        #[arg(long, value_enum)]
        keep: Option<KeepRoot>,

        /// Print the plan without deleting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Move packages into the loaded root
    Load {
        #[arg(required = true)]
        names: Vec<String>,

        /// Also load first-level dependencies
        #[arg(long)]
        with_deps: bool,
    },

    /// Move packages out of the loaded root
    Unload {
        #[arg(required = true)]
        names: Vec<String>,

        /// Also unload first-level dependencies
        #[arg(long)]
        with_deps: bool,
    },

    /// Move old package versions into the archive folder
    Archive {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show the derived status of packages
    Status {
        /// Package names (every package on disk when empty)
        names: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum KeepRoot {
    Loaded,
    Available,
    /// The first external destination holding a copy
    External,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let roots = resolve_roots(&args)?;
    info!("Loaded root: {}", roots.loaded_root.display());
    info!("Available root: {}", roots.available_root.display());

    let engine = PackageEngine::builder(roots)
        .build()
        .await
        .context("Failed to initialize package engine")?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current item");
            watcher.cancel();
        }
    });

    let clean = commands::dispatch(&engine, args.command, args.json, &cancel).await?;
    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn resolve_roots(args: &Args) -> Result<StorageRoots> {
    if let (Some(loaded), Some(available)) = (&args.loaded_root, &args.available_root) {
        return Ok(StorageRoots::new(loaded.clone(), available.clone()));
    }

    let path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()
            .context("No configuration directory on this platform, pass --config")?,
    };
    StorageRoots::load(&path)
        .with_context(|| format!("Failed to read roots from {}", path.display()))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| {
        dir.join(PathsConfig::CONFIG_DIR_NAME)
            .join(PathsConfig::ROOTS_FILE_NAME)
    })
}
