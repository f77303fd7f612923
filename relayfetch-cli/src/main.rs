//! relayfetch CLI - Command-line interface
//!
//! Downloads a URL through the relayfetch engine and probes remote resources.
//! The main thread plays the host update loop: it ticks the dispatch drain,
//! which delivers log lines and the completion callback.

mod commands;
mod error;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::Engine;
use commands::fetch::FetchArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "relayfetch")]
#[command(about = "Background HTTP downloads with retry and a speed watchdog", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/relayfetch/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download a URL
    Fetch(FetchArgs),

    /// Check whether a URL answers a HEAD request with 200
    Exists {
        /// URL to probe
        url: String,
    },

    /// Print the declared content length of a URL (-1 when unknown)
    Length {
        /// URL to probe
        url: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = commands::common::load_config(cli.config.as_deref())?;
    let mut engine = Engine::new(config)?;
    let _log_guard = logging::init(
        engine.fetcher.dispatcher().clone(),
        cli.verbose,
        cli.log_file.as_deref(),
    )?;
    tracing::debug!(config = ?engine.fetcher.config(), "Engine started");

    let result = match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, &mut engine),
        Commands::Exists { url } => commands::probe::exists(&url, &mut engine),
        Commands::Length { url } => commands::probe::length(&url, &mut engine),
    };

    // Deliver any log lines still queued
    engine.pump();
    result
}
