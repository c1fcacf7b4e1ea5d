// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Deployment Platform Port
//!
//! Release statuses are how scangate gates a deployment: one status is
//! created per release when the scan is requested and PATCHed as the scan
//! progresses. Updates are idempotent on the platform side, so the lifecycle
//! may repeat them freely.
//!
//! | Call | Used by |
//! |------|---------|
//! | [`DeploymentPlatform::get_app`] | release hook, to resolve the URL to scan |
//! | [`DeploymentPlatform::create_release_status`] | release hook |
//! | [`DeploymentPlatform::update_release_status`] | release hook, reconciler |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::release::Release;

/// Application details needed to scan it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDetails {
    pub name: String,
    pub web_url: String,
}

/// Gate state shown on the platform release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatusState {
    Pending,
    Success,
    Fail,
    Error,
}

impl ReleaseStatusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatusState::Pending => "pending",
            ReleaseStatusState::Success => "success",
            ReleaseStatusState::Fail => "fail",
            ReleaseStatusState::Error => "error",
        }
    }

    /// Indicator image shown next to the status.
    pub fn image_name(&self) -> &'static str {
        match self {
            ReleaseStatusState::Success => "success_sm.png",
            ReleaseStatusState::Fail | ReleaseStatusState::Error => "failure_sm.png",
            ReleaseStatusState::Pending => "pending_sm.png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub state: ReleaseStatusState,
    pub description: String,
    /// Link shown with the status (report viewer or error details).
    pub target_url: Option<String>,
}

impl StatusUpdate {
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            state: ReleaseStatusState::Pending,
            description: description.into(),
            target_url: None,
        }
    }

    pub fn verdict(state: ReleaseStatusState, description: impl Into<String>, report_url: String) -> Self {
        Self {
            state,
            description: description.into(),
            target_url: Some(report_url),
        }
    }

    /// Terminal error status linking to the error details page.
    pub fn error(error_type: &str, error_url: String) -> Self {
        Self {
            state: ReleaseStatusState::Error,
            description: format!("Scan failed - {}", error_type),
            target_url: Some(error_url),
        }
    }
}

#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    async fn get_app(&self, token: &str, app_name: &str) -> Result<AppDetails, PlatformError>;

    /// Create a status on a release and return its id.
    async fn create_release_status(
        &self,
        token: &str,
        app_name: &str,
        release_id: &str,
        update: &StatusUpdate,
    ) -> Result<String, PlatformError>;

    /// Replace the scan status previously created on `release`.
    async fn update_release_status(&self, release: &Release, update: &StatusUpdate) -> Result<(), PlatformError>;
}

#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("Request to deployment platform failed: {0}")]
    Transport(String),

    #[error("Deployment platform responded with HTTP {status}{}", .body.as_deref().map(|b| format!(": {b}")).unwrap_or_default())]
    Http { status: u16, body: Option<String> },

    #[error("Unexpected response from deployment platform: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PlatformError::Decode(err.to_string())
        } else {
            PlatformError::Transport(err.to_string())
        }
    }
}
