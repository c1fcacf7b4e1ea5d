// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Database Migration Command
//!
//! `scangate migrate` applies the embedded schema migrations.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! scangate migrate
//!
//! # Preview migrations without applying
//! scangate migrate --dry-run
//! ```
//!
//! Requires `database.url` (or `DATABASE_URL`).

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use scangate_core::domain::repository::PostgresConfig;
use scangate_core::infrastructure::db::{Database, MIGRATOR};

use crate::bootstrap::load_config;

#[derive(Args)]
pub struct MigrateCommand {
    /// Show pending migrations without applying them
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: MigrateCommand, config_override: Option<&Path>) -> Result<()> {
    let config = load_config(config_override)?;
    let database_url = config
        .database
        .url
        .clone()
        .context("DATABASE_URL is not set. Cannot run migrations.")?;

    println!("Connecting to database...");
    let database = Database::new(&PostgresConfig {
        connection_string: database_url,
        max_connections: 1,
    })
    .await?;

    let applied = database.applied_migrations().await?;
    let total = MIGRATOR.iter().count();
    println!("Migration status: {} applied, {} total available.", applied, total);

    if applied >= total {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations (dry run):");
        for migration in MIGRATOR.iter().skip(applied) {
            println!(" - {} {}", migration.version, migration.description);
        }
        return Ok(());
    }

    println!("Applying pending migrations...");
    database.run_migrations().await?;
    println!("{}", "✓ Database updated successfully.".green());
    Ok(())
}
