// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Release Hook
//!
//! Entry points that create scans:
//!
//! - [`ReleaseHookService::handle_released`] for platform "released" events,
//!   which gate a release and report progress on it.
//! - [`ReleaseHookService::start_adhoc`] for scans requested directly
//!   through the API, which have no release attached.
//!
//! Both provision a profile, store it at `profile_created`, start the scan
//! and persist the provider's initial state. A failure to start hands the
//! stored profile to the reconciler's terminal-error transition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::context::ScanContext;
use crate::application::errors::LifecycleError;
use crate::application::provisioner::ScanProvisioner;
use crate::application::reconciler::LifecycleReconciler;
use crate::domain::platform::StatusUpdate;
use crate::domain::release::Release;
use crate::domain::scan_error::{ErrorKind, ScanError};
use crate::domain::scan_profile::{ScanProfile, ScanStatus};

const INVALID_PAYLOAD: &str = "Payload did not match expected format";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleasedEvent {
    /// Application name.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub release: Option<ReleaseRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseRef {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidHookPayload(pub String);

impl ReleasedEvent {
    /// Parse and validate a webhook body delivered with `token`.
    pub fn parse(payload: &serde_json::Value, token: Option<&str>) -> Result<Self, InvalidHookPayload> {
        let event: ReleasedEvent = serde_json::from_value(payload.clone())
            .map_err(|_| InvalidHookPayload(INVALID_PAYLOAD.to_string()))?;

        let has_release = event.release.as_ref().is_some_and(|r| !r.id.is_empty());
        let has_token = token.is_some_and(|t| !t.trim().is_empty());
        if event.key.is_empty() || event.action != "released" || !has_release || !has_token {
            return Err(InvalidHookPayload(INVALID_PAYLOAD.to_string()));
        }
        Ok(event)
    }

    pub fn release_id(&self) -> &str {
        self.release.as_ref().map(|r| r.id.as_str()).unwrap_or_default()
    }
}

/// Scan requested directly through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdHocScanRequest {
    pub url: String,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub success_threshold: Option<f64>,
}

pub struct ReleaseHookService {
    ctx: Arc<ScanContext>,
    provisioner: ScanProvisioner,
    reconciler: Arc<LifecycleReconciler>,
}

impl ReleaseHookService {
    pub fn new(ctx: Arc<ScanContext>, reconciler: Arc<LifecycleReconciler>) -> Self {
        Self {
            provisioner: ScanProvisioner::new(ctx.provider.clone()),
            ctx,
            reconciler,
        }
    }

    /// Process a validated "released" event.
    ///
    /// Returns the stored profile, or the error that stopped processing.
    /// Errors after the release status exists are also recorded and reported
    /// on the release.
    pub async fn handle_released(
        &self,
        event: &ReleasedEvent,
        token: &str,
        payload: serde_json::Value,
    ) -> Result<ScanProfile, LifecycleError> {
        let app_name = event.key.as_str();
        let release_id = event.release_id();

        let app = self.ctx.platform.get_app(token, app_name).await.map_err(|e| {
            warn!(app = %app_name, error = %e, "Unable to fetch app details");
            LifecycleError::from(e)
        })?;

        let status_id = self
            .ctx
            .platform
            .create_release_status(
                token,
                app_name,
                release_id,
                &StatusUpdate::pending("Detectify scan pending creation"),
            )
            .await
            .map_err(|e| {
                warn!(app = %app_name, release_id = %release_id, error = %e, "Unable to create release status");
                LifecycleError::from(e)
            })?;

        let release = Release::new(release_id, app_name, status_id, token, payload);
        if let Err(e) = self.ctx.releases.save(&release).await {
            let err = LifecycleError::from(e);
            let description = format!("Unable to store release {}: {}", release_id, err);
            // No row to link the error to; the status on the platform still exists.
            self.report_release_error(&release, false, ErrorKind::ScanError, description)
                .await;
            return Err(err);
        }

        let profile = match self.provisioner.provision(&app.web_url, app_name).await {
            Ok(profile) => profile.with_release(release_id),
            Err(e) => {
                let description = describe_provision_failure(app_name, &app.web_url, &e);
                self.report_release_error(&release, true, ErrorKind::ProviderError, description)
                    .await;
                return Err(e);
            }
        };
        if let Err(e) = self.ctx.profiles.save(&profile).await {
            let err = LifecycleError::from(e);
            self.discard_provider_profile(&profile).await;
            let description = format!("Unable to store scan profile {}: {}", profile.name, err);
            self.report_release_error(&release, true, ErrorKind::ScanError, description)
                .await;
            return Err(err);
        }

        let profile = self.start(profile).await?;
        info!(
            app = %app_name,
            release_id = %release_id,
            profile = %profile.name,
            status = %profile.status,
            "Scan started for release"
        );
        Ok(profile)
    }

    /// Provision and start a scan with no release attached.
    pub async fn start_adhoc(&self, request: &AdHocScanRequest) -> Result<ScanProfile, LifecycleError> {
        let app_name = request.app_name.as_deref().unwrap_or_default();
        let mut profile = self
            .provisioner
            .provision(&request.url, app_name)
            .await?
            .with_success_threshold(request.success_threshold);
        if profile.target_app.is_empty() {
            profile.target_app = profile.target_url.clone();
        }
        if let Err(e) = self.ctx.profiles.save(&profile).await {
            error!(target = %profile.target_url, error = %e, "Failed to store ad-hoc scan profile");
            self.discard_provider_profile(&profile).await;
            return Err(e.into());
        }

        let profile = self.start(profile).await?;
        info!(profile_id = %profile.id, target = %profile.target_url, "Ad-hoc scan started");
        Ok(profile)
    }

    async fn start(&self, mut profile: ScanProfile) -> Result<ScanProfile, LifecycleError> {
        let state = match self.provisioner.start(&profile).await {
            Ok(state) => state,
            Err(e) => {
                let description = format!("Could not start scan on scan profile: {}", e);
                self.reconciler
                    .fail_profile(&profile, ScanStatus::Error, ErrorKind::ProviderError, description)
                    .await;
                return Err(e);
            }
        };

        // Anything other than an in-progress state is left for the next sweep.
        let Some(status) = ScanStatus::from_provider(&state) else {
            return Ok(profile);
        };

        if let Some(release_id) = &profile.release_ref {
            if let Ok(Some(release)) = self.ctx.releases.find_by_id(release_id).await {
                let update = StatusUpdate::pending(format!("Detectify scan {}", state));
                if let Err(e) = self.ctx.platform.update_release_status(&release, &update).await {
                    warn!(release_id = %release_id, error = %e, "Release status update failed");
                }
            }
        }

        self.ctx.profiles.update_status(profile.id, status).await?;
        profile.status = status;
        Ok(profile)
    }

    /// Remove a provider profile that has no stored row, so nothing would
    /// ever clean it up.
    async fn discard_provider_profile(&self, profile: &ScanProfile) {
        match self.ctx.provider.delete_profile(&profile.provider_token).await {
            Ok(()) => info!(profile = %profile.name, "Deleted unstored provider profile"),
            Err(e) => error!(
                profile = %profile.name,
                token = %profile.provider_token,
                error = %e,
                "Failed to delete unstored provider profile"
            ),
        }
    }

    /// Record a failure that happened before any profile was stored and
    /// report it on the release. `release_stored` says whether the error
    /// may reference the release row.
    async fn report_release_error(
        &self,
        release: &Release,
        release_stored: bool,
        kind: ErrorKind,
        description: String,
    ) {
        warn!(release_id = %release.id, error = %description, "Scan provisioning failed");

        let release_ref = release_stored.then(|| release.id.clone());
        let scan_error = ScanError::new(description, release_ref, None);
        if let Err(e) = self.ctx.errors.insert(&scan_error).await {
            error!(release_id = %release.id, error = %e, "Failed to record scan error");
        }

        let update = StatusUpdate::error(kind.label(), self.ctx.settings.error_url(scan_error.id));
        if let Err(e) = self.ctx.platform.update_release_status(release, &update).await {
            warn!(release_id = %release.id, error = %e, "Unable to report error to the platform");
        }
    }
}

fn describe_provision_failure(app_name: &str, web_url: &str, err: &LifecycleError) -> String {
    match err {
        LifecycleError::DomainNotRegistered { .. } => format!(
            "{} URL ({}) base domain could not be found in the list of domains associated with the scan provider account",
            app_name, web_url
        ),
        LifecycleError::InvalidTargetUrl(_) => format!("{} URL ({}) is not a valid URL", app_name, web_url),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_event() {
        let payload = json!({"key": "app-space", "action": "released", "release": {"id": "rel-1"}, "app": {"name": "app"}});
        let event = ReleasedEvent::parse(&payload, Some("token")).unwrap();
        assert_eq!(event.key, "app-space");
        assert_eq!(event.release_id(), "rel-1");
    }

    #[test]
    fn test_parse_rejects_incomplete_events() {
        let ok = json!({"key": "app", "action": "released", "release": {"id": "rel-1"}});
        assert!(ReleasedEvent::parse(&ok, None).is_err());
        assert!(ReleasedEvent::parse(&ok, Some("  ")).is_err());

        let wrong_action = json!({"key": "app", "action": "build", "release": {"id": "rel-1"}});
        assert!(ReleasedEvent::parse(&wrong_action, Some("t")).is_err());

        let no_release = json!({"key": "app", "action": "released"});
        let err = ReleasedEvent::parse(&no_release, Some("t")).unwrap_err();
        assert_eq!(err.to_string(), "Payload did not match expected format");

        assert!(ReleasedEvent::parse(&json!("released"), Some("t")).is_err());
    }

    #[test]
    fn test_domain_failure_description_names_app() {
        let err = LifecycleError::DomainNotRegistered { host: "app.other.com".into() };
        let description = describe_provision_failure("app", "https://app.other.com", &err);
        assert!(description.starts_with("app URL (https://app.other.com) base domain could not be found"));
    }
}
