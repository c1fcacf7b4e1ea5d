// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `scangate sweep` - run a single reconciliation sweep and exit

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::bootstrap::{build_services, load_config};

pub async fn execute(config_override: Option<&Path>, in_memory: bool) -> Result<()> {
    let config = load_config(config_override)?;
    let services = build_services(config, in_memory).await?;

    let summary = services.reconciler.sweep().await.context("Sweep failed")?;

    println!("{}", "Sweep complete".bold());
    println!("  Examined:   {}", summary.examined);
    println!("  Unchanged:  {}", summary.unchanged);
    println!("  Advanced:   {}", summary.advanced);
    println!("  Completed:  {}", summary.completed);
    println!("  Failed:     {}", summary.failed);
    println!("  Timed out:  {}", summary.timed_out);
    println!("  Cleaned up: {}", summary.cleaned_up);
    if summary.deferred > 0 {
        println!("  {}", format!("Deferred:   {}", summary.deferred).yellow());
    } else {
        println!("  Deferred:   0");
    }
    Ok(())
}
