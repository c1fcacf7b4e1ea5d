// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `scangate worker` - periodic reconciliation until SIGTERM/Ctrl+C

use std::path::Path;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use scangate_core::application::SweepScheduler;

use crate::bootstrap::{build_services, load_config, spawn_shutdown_listener};

pub async fn execute(config_override: Option<&Path>, in_memory: bool) -> Result<()> {
    let config = load_config(config_override)?;
    let services = build_services(config, in_memory).await?;

    info!(
        interval = ?services.config.reconciler.interval,
        timeout = ?services.config.reconciler.timeout,
        "Starting reconciliation worker"
    );

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    let scheduler = SweepScheduler::new(
        services.reconciler.clone(),
        services.config.reconciler.interval,
        services.config.reconciler.overlap,
    );
    let stats = scheduler.run(shutdown).await;

    info!(sweeps = stats.started, skipped = stats.skipped, "Worker stopped");
    Ok(())
}
