//! Sprig CLI
//!
//! The interactive surface over the core: tree edits, configuration and
//! the sync trigger. Every mutating command reports the edit through
//! `changes_made`, which keeps the dirty flag honest.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sprig_core::TaskStore;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "sprig")]
#[command(about = "Sprig - an offline task list synchronised against one remote copy")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Data directory (defaults to $SPRIG_DATA_DIR or the platform data dir)
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the task tree
    #[command(alias = "ls")]
    List,
    /// Add a task
    Add {
        /// Label of the new task
        label: String,
        /// Parent task path, e.g. "0.2" (top level when omitted)
        #[arg(long, value_name = "PATH")]
        under: Option<String>,
        /// Position among the parent's children (appended when omitted)
        #[arg(long, value_name = "INDEX")]
        at: Option<usize>,
    },
    /// Move a task and its whole subtree
    #[command(name = "move")]
    Move {
        /// Path of the task to move
        path: String,
        /// New parent task path (top level when omitted)
        #[arg(long, value_name = "PATH")]
        under: Option<String>,
        /// Position among the new parent's children (appended when omitted)
        #[arg(long, value_name = "INDEX")]
        at: Option<usize>,
    },
    /// Rename a task
    Rename {
        path: String,
        label: String,
    },
    /// Remove a task and its whole subtree
    #[command(alias = "rm")]
    Remove {
        path: String,
    },
    /// Synchronise with the remote copy
    Sync {
        /// Keep an external merge result without prompting
        #[arg(long)]
        yes: bool,
    },
    /// Show sync status
    Status,
    /// Show or edit configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value (an empty value clears it)
    Set {
        /// Configuration key (load-url, save-url, merge-command)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let data_dir = resolve_data_dir(cli.data_dir);

    let mut store = TaskStore::open(&data_dir)
        .with_context(|| format!("failed to open task store in {}", data_dir.display()))?;

    match cli.command {
        Commands::List => commands::task::list(&store, &output),
        Commands::Add { label, under, at } => {
            commands::task::add(&mut store, label, under, at, &output)
        }
        Commands::Move { path, under, at } => {
            commands::task::relocate(&mut store, path, under, at, &output)
        }
        Commands::Rename { path, label } => {
            commands::task::rename(&mut store, path, label, &output)
        }
        Commands::Remove { path } => commands::task::remove(&mut store, path, &output),
        Commands::Sync { yes } => commands::sync::run(&mut store, yes, &output),
        Commands::Status => commands::status::show(&store, &output),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&store, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(&mut store, &key, &value, &output)
            }
        },
    }
}

/// The --data-dir flag wins, then $SPRIG_DATA_DIR, then the platform dir
fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if let Ok(dir) = std::env::var("SPRIG_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sprig")
}
