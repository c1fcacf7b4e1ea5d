// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Scangate
//!
//! The `scangate` binary gates application releases on a security scan.
//!
//! ## Commands
//!
//! - `scangate serve [--with-worker]` - HTTP API (release webhook, ad-hoc scans, reports)
//! - `scangate worker` - Periodic reconciliation of in-flight scans
//! - `scangate sweep` - One reconciliation sweep, then exit
//! - `scangate migrate [--dry-run]` - Apply database migrations
//! - `scangate config show|validate|generate` - Configuration management
//!
//! Settings come from `scangate.yaml` with environment overrides; a `.env`
//! file in the working directory is loaded first.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use scangate::bootstrap::init_metrics;
use scangate::commands::{self, ConfigCommand, MigrateCommand, ServeCommand};

/// Scangate - security scan gate for application releases
#[derive(Parser)]
#[command(name = "scangate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SCANGATE_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SCANGATE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "SCANGATE_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Use in-memory repositories and report archive (no PostgreSQL or S3)
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        command: ServeCommand,
    },

    /// Run the reconciliation worker
    #[command(name = "worker")]
    Worker,

    /// Run a single reconciliation sweep
    #[command(name = "sweep")]
    Sweep,

    /// Apply database migrations
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    if let Some(port) = cli.metrics_port {
        init_metrics(port)?;
    }

    let config = cli.config.as_deref();
    match cli.command {
        Some(Commands::Serve { command }) => {
            info!("Starting scangate API");
            commands::serve::execute(command, config, cli.in_memory).await
        }
        Some(Commands::Worker) => commands::worker::execute(config, cli.in_memory).await,
        Some(Commands::Sweep) => commands::sweep::execute(config, cli.in_memory).await,
        Some(Commands::Migrate { command }) => commands::migrate::execute(command, config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, config, cli.in_memory).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
