// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Sweep scheduler
//!
//! Drives the reconciler on a fixed interval. The first sweep runs
//! immediately. Ticks that fire while a sweep is still running either start
//! another sweep ([`OverlapPolicy::Allow`]) or are dropped
//! ([`OverlapPolicy::Skip`]).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::reconciler::LifecycleReconciler;
use crate::domain::config::OverlapPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub started: usize,
    pub skipped: usize,
}

pub struct SweepScheduler {
    reconciler: Arc<LifecycleReconciler>,
    interval: Duration,
    overlap: OverlapPolicy,
}

impl SweepScheduler {
    pub fn new(reconciler: Arc<LifecycleReconciler>, interval: Duration, overlap: OverlapPolicy) -> Self {
        Self {
            reconciler,
            interval,
            overlap,
        }
    }

    /// Run until `shutdown` is cancelled, then wait for in-flight sweeps.
    pub async fn run(&self, shutdown: CancellationToken) -> SchedulerStats {
        info!(interval = ?self.interval, overlap = ?self.overlap, "Sweep scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut sweeps = JoinSet::new();
        let mut stats = SchedulerStats::default();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if self.overlap == OverlapPolicy::Skip && in_flight.load(Ordering::SeqCst) > 0 {
                        debug!("Previous sweep still running, skipping tick");
                        metrics::counter!("scangate_sweeps_skipped_total").increment(1);
                        stats.skipped += 1;
                        continue;
                    }

                    in_flight.fetch_add(1, Ordering::SeqCst);
                    stats.started += 1;

                    let reconciler = self.reconciler.clone();
                    let in_flight = in_flight.clone();
                    sweeps.spawn(async move {
                        if let Err(e) = reconciler.sweep().await {
                            error!(error = %e, "Sweep failed");
                        }
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                Some(joined) = sweeps.join_next(), if !sweeps.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Sweep task aborted");
                    }
                }
            }
        }

        if !sweeps.is_empty() {
            warn!(in_flight = sweeps.len(), "Waiting for in-flight sweeps to finish");
        }
        while let Some(joined) = sweeps.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Sweep task aborted");
            }
        }

        info!(started = stats.started, skipped = stats.skipped, "Sweep scheduler stopped");
        stats
    }
}
