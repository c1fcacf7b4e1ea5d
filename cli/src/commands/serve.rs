// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `scangate serve` - HTTP API (webhook, ad-hoc scans, reads)

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use scangate_core::{
    application::SweepScheduler,
    infrastructure::auth::{AllowAllAuthenticator, HttpTokenAuthenticator, TokenAuthenticator},
    presentation::api::{app, AppState},
};

use crate::bootstrap::{build_services, load_config, spawn_shutdown_listener};

#[derive(Args)]
pub struct ServeCommand {
    /// Also run the reconciliation worker in this process
    #[arg(long)]
    pub with_worker: bool,
}

pub async fn execute(cmd: ServeCommand, config_override: Option<&Path>, in_memory: bool) -> Result<()> {
    let config = load_config(config_override)?;
    let services = build_services(config, in_memory).await?;
    let config = &services.config;

    let auth: Arc<dyn TokenAuthenticator> = match &config.auth.auth_host {
        Some(host) => Arc::new(HttpTokenAuthenticator::new(host.clone()).context("Failed to create auth client")?),
        None => {
            tracing::warn!("AUTH_HOST not set; ad-hoc scan requests are not authenticated");
            Arc::new(AllowAllAuthenticator)
        }
    };

    let state = AppState {
        ctx: services.ctx.clone(),
        hooks: services.hooks.clone(),
        auth,
        ui_url: config.platform.ui_url.clone(),
        start_time: Instant::now(),
    };
    let router = app(state);

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    let worker = if cmd.with_worker {
        let scheduler = SweepScheduler::new(
            services.reconciler.clone(),
            config.reconciler.interval,
            config.reconciler.overlap,
        );
        let token = shutdown.clone();
        Some(tokio::spawn(async move { scheduler.run(token).await }))
    } else {
        None
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("scangate listening on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    if let Some(worker) = worker {
        worker.await.context("Worker task failed")?;
    }

    info!("scangate shutting down");
    Ok(())
}
