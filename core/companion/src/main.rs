//! companion: host for the session/activity tracker.
//!
//! Speaks a newline-delimited JSON protocol on stdin/stdout so a desktop
//! shell (or any presenter) can drive the tracker and receive its
//! notifications.
//!
//! ## Subcommands
//!
//! - `run [DIR]`: serve the line protocol for DIR (default)
//! - `status [DIR]`: probe once and print the connection status
//! - `open DIR`: launch a detached instance for DIR
//! - `window-state`: print the saved window geometry

mod host;
mod logging;
mod runtime;

use clap::{Parser, Subcommand};
use companion_core::{
    config_path, load_config_or_default, resolve_initial_directory, CompanionError, Launcher,
    StorageConfig, Tracker, WindowState,
};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

use host::Host;

#[derive(Parser)]
#[command(name = "companion")]
#[command(about = "Session and activity tracker for a coding assistant")]
#[command(version)]
struct Cli {
    /// Pass --dangerously-skip-permissions to the assistant CLI
    #[arg(long, global = true)]
    dangerously_skip_permissions: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the line protocol on stdin/stdout
    Run {
        /// Directory to track (defaults to the current directory)
        #[arg(value_name = "DIR")]
        dir: Option<String>,
    },

    /// Probe the assistant once and print the connection status
    Status {
        #[arg(value_name = "DIR")]
        dir: Option<String>,
    },

    /// Launch a detached instance tracking DIR
    Open {
        #[arg(value_name = "DIR")]
        dir: String,
    },

    /// Print the saved window geometry
    WindowState,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] CompanionError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Launch(String),
}

fn main() {
    let cli = Cli::parse();
    let storage = StorageConfig::new().ok();
    let _logging_guard = logging::init(storage.as_ref().map(|s| s.logs_dir()).as_deref());

    let Some(storage) = storage else {
        tracing::error!("Home directory not found");
        std::process::exit(1);
    };

    let command = cli.command.unwrap_or(Commands::Run { dir: None });
    let result = match command {
        Commands::Run { dir } => run(&storage, dir.as_deref(), cli.dangerously_skip_permissions),
        Commands::Status { dir } => status(&storage, dir.as_deref()),
        Commands::Open { dir } => open(&dir),
        Commands::WindowState => print_json(&WindowState::load(&storage.window_state_file())),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "companion failed");
        std::process::exit(1);
    }
}

fn run(storage: &StorageConfig, dir: Option<&str>, skip_permissions: bool) -> Result<(), CliError> {
    let root = initial_directory(dir)?;
    let config = load_config_or_default(&config_path(storage));
    tracing::info!(root = %root.display(), "Companion starting");

    let mut host = Host::new(root, config, storage.clone(), skip_permissions);
    let input = runtime::spawn_reader(io::BufReader::new(io::stdin()));
    let stdout = io::stdout();
    let mut out = stdout.lock();
    runtime::serve(&mut host, &input, &mut out)?;
    Ok(())
}

fn status(storage: &StorageConfig, dir: Option<&str>) -> Result<(), CliError> {
    let root = initial_directory(dir)?;
    let config = load_config_or_default(&config_path(storage));
    let mut tracker = Tracker::builder(root)
        .config(config.tracker)
        .probe_config(config.probe)
        .build();
    tracker.initialize();
    print_json(&tracker.connection_status())
}

fn open(dir: &str) -> Result<(), CliError> {
    let result = Launcher::current()?.launch_instance(dir);
    print_json(&result)?;
    if result.success {
        Ok(())
    } else {
        Err(CliError::Launch(result.message))
    }
}

fn initial_directory(dir: Option<&str>) -> Result<PathBuf, CliError> {
    let cwd = std::env::current_dir()?;
    Ok(resolve_initial_directory(dir, &cwd))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
