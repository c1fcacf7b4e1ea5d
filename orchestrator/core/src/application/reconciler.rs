// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Lifecycle Reconciler
//!
//! Periodic sweep over the working set. Each profile is advanced at most one
//! step per sweep:
//!
//! | Persisted status | Provider state | Result |
//! |------------------|----------------|--------|
//! | success / fail / error / timeout | not polled | cleanup resumed, then deleted |
//! | older than the timeout window | not polled | `timeout` + ScanError, deleted |
//! | any | poll fails | `error` + ScanError, deleted |
//! | any | `unable_to_resolve` / `unable_to_complete` | `error` + ScanError, deleted |
//! | any | `stopped` | report classified, verdict reported, archived, deleted |
//! | X | Y ≠ X in-progress | status Y persisted, pending update sent |
//! | X | X | nothing |
//!
//! Deletion removes the provider profile first and only then soft-deletes the
//! profile and its release, so a failed provider delete leaves the profile in
//! the working set for the next sweep. Platform updates are best-effort and
//! never block a transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::application::context::ScanContext;
use crate::application::errors::{LifecycleError, ProviderStage};
use crate::domain::platform::{ReleaseStatusState, StatusUpdate};
use crate::domain::scan_error::{ErrorKind, ScanError};
use crate::domain::scan_profile::{classify, ScanProfile, ScanStatus};
use crate::domain::scan_provider::{FullReport, ProviderError, ProviderScanState};
use crate::domain::storage::StorageError;

/// Object metadata key holding the provider token of an archived report.
pub const REPORT_TOKEN_METADATA: &str = "scanProfileToken";

/// What one sweep did to one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOutcome {
    /// Provider state matched the persisted status.
    Unchanged,
    /// New in-progress status persisted.
    Advanced(ScanStatus),
    /// Verdict recorded, report archived, profile deleted.
    Completed(ScanStatus),
    /// Terminal error recorded and profile deleted.
    Failed,
    /// Timed out, recorded and deleted.
    TimedOut,
    /// Interrupted cleanup of an already-terminal profile finished.
    CleanedUp,
    /// A step failed; the profile stays in the working set.
    Deferred,
}

impl ProfileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileOutcome::Unchanged => "unchanged",
            ProfileOutcome::Advanced(_) => "advanced",
            ProfileOutcome::Completed(_) => "completed",
            ProfileOutcome::Failed => "failed",
            ProfileOutcome::TimedOut => "timed_out",
            ProfileOutcome::CleanedUp => "cleaned_up",
            ProfileOutcome::Deferred => "deferred",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub examined: usize,
    pub unchanged: usize,
    pub advanced: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cleaned_up: usize,
    pub deferred: usize,
}

impl SweepSummary {
    fn record(&mut self, outcome: ProfileOutcome) {
        self.examined += 1;
        match outcome {
            ProfileOutcome::Unchanged => self.unchanged += 1,
            ProfileOutcome::Advanced(_) => self.advanced += 1,
            ProfileOutcome::Completed(_) => self.completed += 1,
            ProfileOutcome::Failed => self.failed += 1,
            ProfileOutcome::TimedOut => self.timed_out += 1,
            ProfileOutcome::CleanedUp => self.cleaned_up += 1,
            ProfileOutcome::Deferred => self.deferred += 1,
        }
    }
}

pub struct LifecycleReconciler {
    ctx: Arc<ScanContext>,
}

impl LifecycleReconciler {
    pub fn new(ctx: Arc<ScanContext>) -> Self {
        Self { ctx }
    }

    /// Run one sweep over the working set.
    ///
    /// Only a failure to list the working set is returned; per-profile
    /// failures are logged and counted as deferred.
    pub async fn sweep(&self) -> Result<SweepSummary, LifecycleError> {
        let started = Instant::now();
        let profiles = self.ctx.profiles.list_working_set().await?;
        debug!(count = profiles.len(), "Starting sweep");

        let outcomes: Vec<ProfileOutcome> = stream::iter(profiles)
            .map(|profile| self.process_profile(profile))
            .buffer_unordered(self.ctx.settings.max_concurrency.max(1))
            .collect()
            .await;

        let mut summary = SweepSummary::default();
        for outcome in outcomes {
            metrics::counter!("scangate_profile_outcomes_total", "outcome" => outcome.as_str()).increment(1);
            summary.record(outcome);
        }

        metrics::counter!("scangate_sweeps_total").increment(1);
        metrics::histogram!("scangate_sweep_duration_seconds").record(started.elapsed().as_secs_f64());

        if summary.examined > 0 {
            info!(
                examined = summary.examined,
                advanced = summary.advanced,
                completed = summary.completed,
                failed = summary.failed,
                timed_out = summary.timed_out,
                deferred = summary.deferred,
                "Sweep finished"
            );
        }
        Ok(summary)
    }

    /// Advance a single profile by one step.
    pub async fn process_profile(&self, profile: ScanProfile) -> ProfileOutcome {
        if profile.deleted {
            return ProfileOutcome::Unchanged;
        }

        // Ahead of the timeout check so a finished profile never gains a second ScanError.
        if profile.status.is_terminal() {
            return self.resume_cleanup(&profile).await;
        }

        let settings = &self.ctx.settings;
        if profile.has_timed_out(Utc::now(), settings.timeout) {
            warn!(profile_id = %profile.id, status = %profile.status, "Scan timed out");
            let description = format!(
                "The scan took longer than {} minutes to complete.",
                settings.timeout_minutes()
            );
            return self
                .fail_profile(&profile, ScanStatus::Timeout, ErrorKind::Timeout, description)
                .await;
        }

        let state = match self.ctx.provider.scan_status(&profile.provider_token).await {
            Ok(state) => state,
            Err(e) => {
                let err = LifecycleError::provider(ProviderStage::ScanStatus, e);
                warn!(profile_id = %profile.id, error = %err, "Unable to poll scan status");
                return self
                    .fail_profile(
                        &profile,
                        ScanStatus::Error,
                        err.kind(),
                        "Unable to get scan profile status from the scan provider".to_string(),
                    )
                    .await;
            }
        };

        if state.is_error() {
            warn!(profile_id = %profile.id, state = %state, "Scan ended with a provider error");
            return self
                .fail_profile(
                    &profile,
                    ScanStatus::Error,
                    ErrorKind::ScanError,
                    format!("Scan returned with an error: {}", state),
                )
                .await;
        }

        if state == ProviderScanState::Stopped {
            return self.complete(&profile).await;
        }

        match ScanStatus::from_provider(&state) {
            Some(status) if status != profile.status => self.advance(&profile, status).await,
            Some(_) => ProfileOutcome::Unchanged,
            None => {
                warn!(profile_id = %profile.id, state = %state, "Unrecognized provider scan state");
                ProfileOutcome::Unchanged
            }
        }
    }

    async fn advance(&self, profile: &ScanProfile, status: ScanStatus) -> ProfileOutcome {
        if let Err(e) = self.ctx.profiles.update_status(profile.id, status).await {
            error!(profile_id = %profile.id, error = %e, "Failed to persist scan status");
            return ProfileOutcome::Deferred;
        }
        debug!(profile_id = %profile.id, from = %profile.status, to = %status, "Scan status changed");

        self.notify(profile, StatusUpdate::pending(format!("Detectify scan {}", status)))
            .await;
        ProfileOutcome::Advanced(status)
    }

    async fn complete(&self, profile: &ScanProfile) -> ProfileOutcome {
        let report = match self.ctx.provider.full_report(&profile.provider_token).await {
            Ok(report) => report,
            Err(e) => {
                let err = LifecycleError::ReportFetch(e);
                warn!(profile_id = %profile.id, error = %err, "Unable to fetch full report");
                return self
                    .fail_profile(
                        profile,
                        ScanStatus::Error,
                        err.kind(),
                        "Unable to get full scan report from the scan provider".to_string(),
                    )
                    .await;
            }
        };

        let threshold = profile.threshold(self.ctx.settings.success_threshold);
        let verdict = classify(report.cvss, threshold);
        info!(
            profile_id = %profile.id,
            cvss = report.cvss,
            threshold,
            verdict = %verdict,
            "Scan completed"
        );

        let (state, description) = match verdict {
            ScanStatus::Success => (ReleaseStatusState::Success, "Detectify scan passed!"),
            _ => (ReleaseStatusState::Fail, "Detectify scan failed"),
        };
        self.notify(
            profile,
            StatusUpdate::verdict(state, description, self.ctx.settings.report_url(profile.id)),
        )
        .await;

        let report_key = match self.archive_report(profile, &report).await {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(profile_id = %profile.id, error = %e, "Report archive failed, will retry");
                None
            }
        };

        if let Err(e) = self
            .ctx
            .profiles
            .record_verdict(profile.id, verdict, report_key.as_deref())
            .await
        {
            error!(profile_id = %profile.id, error = %e, "Failed to persist scan verdict");
            return ProfileOutcome::Deferred;
        }

        if report_key.is_none() {
            return ProfileOutcome::Deferred;
        }

        match self.delete_profile(profile).await {
            Ok(()) => ProfileOutcome::Completed(verdict),
            Err(e) => {
                warn!(profile_id = %profile.id, error = %e, "Profile deletion failed, will retry");
                ProfileOutcome::Deferred
            }
        }
    }

    /// Finish a profile whose terminal status was persisted by an earlier,
    /// interrupted sweep. The platform has already been told.
    ///
    /// A verdict profile is never deleted before its report is archived,
    /// however old it is: the provider holds the only copy.
    async fn resume_cleanup(&self, profile: &ScanProfile) -> ProfileOutcome {
        if profile.status.is_verdict() && profile.report_key.is_none() {
            if let Err(e) = self.rearchive(profile).await {
                warn!(profile_id = %profile.id, error = %e, "Report archive retry failed");
                return ProfileOutcome::Deferred;
            }
        }

        match self.delete_profile(profile).await {
            Ok(()) => ProfileOutcome::CleanedUp,
            Err(e) => {
                warn!(profile_id = %profile.id, error = %e, "Profile deletion failed, will retry");
                ProfileOutcome::Deferred
            }
        }
    }

    async fn rearchive(&self, profile: &ScanProfile) -> Result<(), LifecycleError> {
        let report = self
            .ctx
            .provider
            .full_report(&profile.provider_token)
            .await
            .map_err(LifecycleError::ReportFetch)?;
        let key = self.archive_report(profile, &report).await?;
        self.ctx
            .profiles
            .record_verdict(profile.id, profile.status, Some(&key))
            .await?;
        Ok(())
    }

    async fn archive_report(&self, profile: &ScanProfile, report: &FullReport) -> Result<String, LifecycleError> {
        let key = profile.report_key_at(Utc::now());
        let body = report
            .to_json_bytes()
            .map_err(|e| StorageError::Backend(format!("Failed to serialize report: {}", e)))?;
        let metadata = HashMap::from([(REPORT_TOKEN_METADATA.to_string(), profile.provider_token.clone())]);

        self.ctx.archive.put(&key, body, metadata).await?;
        debug!(profile_id = %profile.id, key = %key, "Archived scan report");
        Ok(key)
    }

    /// Terminal-error transition: record the error and status together,
    /// tell the platform, then run the deletion protocol.
    pub async fn fail_profile(
        &self,
        profile: &ScanProfile,
        status: ScanStatus,
        kind: ErrorKind,
        description: String,
    ) -> ProfileOutcome {
        let scan_error = ScanError::new(description, profile.release_ref.clone(), Some(profile.id));
        if let Err(e) = self
            .ctx
            .profiles
            .record_terminal_error(profile.id, status, &scan_error)
            .await
        {
            error!(profile_id = %profile.id, error = %e, "Failed to record terminal error");
            return ProfileOutcome::Deferred;
        }
        metrics::counter!("scangate_scan_errors_total", "kind" => kind.label()).increment(1);

        self.notify(
            profile,
            StatusUpdate::error(kind.label(), self.ctx.settings.error_url(scan_error.id)),
        )
        .await;

        match self.delete_profile(profile).await {
            Ok(()) if status == ScanStatus::Timeout => ProfileOutcome::TimedOut,
            Ok(()) => ProfileOutcome::Failed,
            Err(e) => {
                warn!(profile_id = %profile.id, error = %e, "Profile deletion failed, will retry");
                ProfileOutcome::Deferred
            }
        }
    }

    /// Deletion protocol: provider profile first, then the local rows.
    ///
    /// A provider 404 counts as already deleted.
    pub async fn delete_profile(&self, profile: &ScanProfile) -> Result<(), LifecycleError> {
        match self.ctx.provider.delete_profile(&profile.provider_token).await {
            Ok(()) => {}
            Err(ProviderError::Http { status: 404, .. }) => {
                debug!(profile_id = %profile.id, "Provider profile already deleted");
            }
            Err(e) => return Err(LifecycleError::provider(ProviderStage::DeleteProfile, e)),
        }

        self.ctx.profiles.soft_delete(profile.id).await?;
        if let Some(release_id) = &profile.release_ref {
            self.ctx.releases.soft_delete(release_id).await?;
        }
        info!(profile_id = %profile.id, status = %profile.status, "Scan profile deleted");
        Ok(())
    }

    /// Best-effort release status update for profiles attached to a release.
    async fn notify(&self, profile: &ScanProfile, update: StatusUpdate) {
        let Some(release_id) = &profile.release_ref else {
            return;
        };

        let release = match self.ctx.releases.find_by_id(release_id).await {
            Ok(Some(release)) => release,
            Ok(None) => {
                warn!(profile_id = %profile.id, release_id = %release_id, "Release not found, skipping status update");
                return;
            }
            Err(e) => {
                warn!(profile_id = %profile.id, error = %e, "Failed to load release for status update");
                return;
            }
        };

        if let Err(e) = self.ctx.platform.update_release_status(&release, &update).await {
            let err = LifecycleError::from(e);
            warn!(
                profile_id = %profile.id,
                release_id = %release_id,
                state = update.state.as_str(),
                error = %err,
                "Release status update failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = SweepSummary::default();
        summary.record(ProfileOutcome::Advanced(ScanStatus::Running));
        summary.record(ProfileOutcome::Completed(ScanStatus::Fail));
        summary.record(ProfileOutcome::Deferred);
        summary.record(ProfileOutcome::TimedOut);

        assert_eq!(summary.examined, 4);
        assert_eq!(summary.advanced, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.failed, 0);
    }
}
