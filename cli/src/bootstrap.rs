// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Service wiring shared by `serve`, `worker` and `sweep`
//!
//! Builds the [`ScanContext`] from configuration: repositories (PostgreSQL or
//! in-memory), the scan provider and platform clients, and the report
//! archive. Also hosts the process-level concerns: signal handling and the
//! Prometheus exporter.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scangate_core::{
    application::{LifecycleReconciler, ReleaseHookService, ScanContext, ScanSettings},
    domain::{
        config::{resolve_secret, ScangateConfig},
        repository::{PostgresConfig, StorageBackend},
        storage::ReportArchive,
    },
    infrastructure::{
        akkeris::AkkerisClient,
        db::Database,
        detectify::DetectifyClient,
        repositories::create_repositories,
        storage::OpenDalReportArchive,
    },
};

/// Fully wired services.
pub struct Services {
    pub config: ScangateConfig,
    pub ctx: Arc<ScanContext>,
    pub reconciler: Arc<LifecycleReconciler>,
    pub hooks: Arc<ReleaseHookService>,
}

/// Load configuration from `--config`, `SCANGATE_CONFIG` or `./scangate.yaml`,
/// then apply environment overrides.
pub fn load_config(config_override: Option<&Path>) -> Result<ScangateConfig> {
    let discovered = match config_override {
        Some(path) => Some(path.to_path_buf()),
        None => ScangateConfig::discover_config(),
    };
    ScangateConfig::load(discovered.as_deref()).context("Failed to load configuration")
}

/// Validate configuration, tolerating the settings in-memory mode replaces.
pub fn validate_config(config: &ScangateConfig, in_memory: bool) -> Result<()> {
    if !in_memory {
        return config.validate().context("Configuration validation failed");
    }

    let missing: Vec<&str> = config
        .missing_settings()
        .into_iter()
        .filter(|s| !s.starts_with("database.") && !s.starts_with("storage."))
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("Missing configuration setting(s): {}", missing.join(", "));
    }
    Ok(())
}

pub async fn build_services(config: ScangateConfig, in_memory: bool) -> Result<Services> {
    validate_config(&config, in_memory)?;

    let (backend, database) = if in_memory {
        warn!("Running with in-memory repositories and archive; state is lost on exit");
        (StorageBackend::InMemory, None)
    } else {
        let postgres = PostgresConfig {
            connection_string: config.database.url.clone().unwrap_or_default(),
            max_connections: config.database.max_connections,
        };
        let database = Database::new(&postgres).await?;
        database.run_migrations().await?;
        info!("Connected to PostgreSQL and applied migrations");
        (StorageBackend::PostgreSQL(postgres), Some(database))
    };
    let repositories = create_repositories(&backend, database.as_ref());

    let archive: Arc<dyn ReportArchive> = if in_memory {
        Arc::new(OpenDalReportArchive::memory().context("Failed to create in-memory archive")?)
    } else {
        Arc::new(OpenDalReportArchive::s3(&config.storage).context("Failed to configure report storage")?)
    };

    let api_key = resolve_secret(config.provider.api_key.as_deref().unwrap_or_default())?;
    let provider = DetectifyClient::new(config.provider.api_url.clone().unwrap_or_default(), api_key)
        .context("Failed to create scan provider client")?;
    let platform = AkkerisClient::new(
        config.platform.api_url.clone().unwrap_or_default(),
        config.server.public_url.clone(),
    )
    .context("Failed to create deployment platform client")?;

    let ctx = Arc::new(ScanContext {
        profiles: repositories.profiles,
        releases: repositories.releases,
        errors: repositories.errors,
        provider: Arc::new(provider),
        platform: Arc::new(platform),
        archive,
        settings: ScanSettings::from_config(&config),
    });
    let reconciler = Arc::new(LifecycleReconciler::new(ctx.clone()));
    let hooks = Arc::new(ReleaseHookService::new(ctx.clone(), reconciler.clone()));

    Ok(Services {
        config,
        ctx,
        reconciler,
        hooks,
    })
}

/// Install the Prometheus exporter on `port` and describe the sweep metrics.
pub fn init_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    metrics::describe_counter!("scangate_sweeps_total", "Reconciliation sweeps run");
    metrics::describe_counter!("scangate_sweeps_skipped_total", "Scheduler ticks skipped while a sweep was running");
    metrics::describe_counter!("scangate_profile_outcomes_total", "Per-profile sweep outcomes");
    metrics::describe_counter!("scangate_scan_errors_total", "Terminal scan errors recorded");
    metrics::describe_histogram!("scangate_sweep_duration_seconds", "Sweep duration");

    info!("Prometheus metrics listening on {}", addr);
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM.
pub fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
