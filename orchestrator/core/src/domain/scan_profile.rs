// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Scan Profile Aggregate
//!
//! A `ScanProfile` is one provider-side scan attempt tracked by scangate.
//! Profiles are created at [`ScanStatus::ProfileCreated`] once the scan
//! provider has assigned a token, advanced by the lifecycle reconciler and
//! soft-deleted once their verdict has been reported.
//!
//! ```text
//! profile_created ──► starting / running / stopping ──► stopped ──► success | fail
//!        │                       │
//!        └───────────────────────┴──────────────────────────────► error | timeout
//! ```
//!
//! `stopped` is collapsed into `success` / `fail` within the sweep that
//! observes it and is never persisted on its own.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::scan_provider::{ProviderProfile, ProviderScanState};

/// Severity score at or above which a scan is reported as failed.
///
/// Scores follow the provider's 0–10 scale (0–2.9 low, 3–5.9 medium, 6–10 high).
pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanProfileId(pub Uuid);

impl ScanProfileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ScanProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted lifecycle status of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    ProfileCreated,
    Starting,
    Running,
    Stopping,
    Stopped,
    Success,
    Fail,
    Error,
    Timeout,
}

impl ScanStatus {
    /// Statuses the reconciler sweeps over.
    ///
    /// Terminal statuses are included so that a profile whose cleanup was
    /// interrupted is picked up again and deleted.
    pub const WORKING_SET: [ScanStatus; 8] = [
        ScanStatus::ProfileCreated,
        ScanStatus::Starting,
        ScanStatus::Running,
        ScanStatus::Stopping,
        ScanStatus::Success,
        ScanStatus::Fail,
        ScanStatus::Error,
        ScanStatus::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::ProfileCreated => "profile_created",
            ScanStatus::Starting => "starting",
            ScanStatus::Running => "running",
            ScanStatus::Stopping => "stopping",
            ScanStatus::Stopped => "stopped",
            ScanStatus::Success => "success",
            ScanStatus::Fail => "fail",
            ScanStatus::Error => "error",
            ScanStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Success | ScanStatus::Fail | ScanStatus::Error | ScanStatus::Timeout
        )
    }

    /// Verdict statuses carry an archived report.
    pub fn is_verdict(&self) -> bool {
        matches!(self, ScanStatus::Success | ScanStatus::Fail)
    }

    /// Map an in-progress provider state onto a persisted status.
    ///
    /// Returns `None` for `stopped`, the provider error states and any state
    /// the provider adds later; those are handled explicitly by the reconciler.
    pub fn from_provider(state: &ProviderScanState) -> Option<Self> {
        match state {
            ProviderScanState::Starting => Some(ScanStatus::Starting),
            ProviderScanState::Running => Some(ScanStatus::Running),
            ProviderScanState::Stopping => Some(ScanStatus::Stopping),
            _ => None,
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown scan status: {0}")]
pub struct UnknownScanStatus(pub String);

impl FromStr for ScanStatus {
    type Err = UnknownScanStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile_created" => Ok(ScanStatus::ProfileCreated),
            "starting" => Ok(ScanStatus::Starting),
            "running" => Ok(ScanStatus::Running),
            "stopping" => Ok(ScanStatus::Stopping),
            "stopped" => Ok(ScanStatus::Stopped),
            "success" => Ok(ScanStatus::Success),
            "fail" => Ok(ScanStatus::Fail),
            "error" => Ok(ScanStatus::Error),
            "timeout" => Ok(ScanStatus::Timeout),
            other => Err(UnknownScanStatus(other.to_string())),
        }
    }
}

/// Classify a report's aggregate severity score against a threshold.
///
/// The boundary is inclusive on the failing side: `score == threshold` fails.
pub fn classify(score: f64, threshold: f64) -> ScanStatus {
    if score < threshold {
        ScanStatus::Success
    } else {
        ScanStatus::Fail
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProfile {
    pub id: ScanProfileId,
    /// Token assigned by the scan provider, used for every provider call.
    pub provider_token: String,
    /// Provider-side profile name.
    pub name: String,
    pub target_app: String,
    /// Host under scan.
    pub target_url: String,
    /// Platform release this scan gates, if any.
    pub release_ref: Option<String>,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub report_key: Option<String>,
    pub success_threshold: Option<f64>,
    pub deleted: bool,
}

impl ScanProfile {
    pub fn new(provider_profile: ProviderProfile, target_app: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ScanProfileId::new(),
            provider_token: provider_profile.token,
            name: provider_profile.name,
            target_app: target_app.into(),
            target_url: provider_profile.endpoint,
            release_ref: None,
            status: ScanStatus::ProfileCreated,
            created_at: now,
            updated_at: now,
            report_key: None,
            success_threshold: None,
            deleted: false,
        }
    }

    pub fn with_release(mut self, release_id: impl Into<String>) -> Self {
        self.release_ref = Some(release_id.into());
        self
    }

    pub fn with_success_threshold(mut self, threshold: Option<f64>) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Threshold used to classify this profile's report.
    pub fn threshold(&self, default: f64) -> f64 {
        self.success_threshold.unwrap_or(default)
    }

    /// Whether the profile has outlived the timeout window, measured from `created_at`.
    pub fn has_timed_out(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => now.signed_duration_since(self.created_at) > window,
            Err(_) => false,
        }
    }

    /// Key under which a report fetched at `at` is archived.
    pub fn report_key_at(&self, at: DateTime<Utc>) -> String {
        format!("{}_{}.json", self.provider_token, at.timestamp_millis())
    }
}
