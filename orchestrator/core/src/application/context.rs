// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Scan context
//!
//! Explicitly constructed bundle of the collaborators every lifecycle
//! service needs. Built once by the binary (or a test) and shared by `Arc`.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::config::ScangateConfig;
use crate::domain::platform::DeploymentPlatform;
use crate::domain::repository::{ReleaseRepository, ScanErrorRepository, ScanProfileRepository};
use crate::domain::scan_error::ScanErrorId;
use crate::domain::scan_profile::{ScanProfileId, DEFAULT_SUCCESS_THRESHOLD};
use crate::domain::scan_provider::ScanProvider;
use crate::domain::storage::ReportArchive;

/// Settings the lifecycle reads on every sweep.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Base URL for report and error links, without trailing slash.
    pub public_url: String,
    pub timeout: Duration,
    pub success_threshold: f64,
    pub max_concurrency: usize,
}

impl ScanSettings {
    pub fn from_config(config: &ScangateConfig) -> Self {
        Self {
            public_url: config.server.public_url.trim_end_matches('/').to_string(),
            timeout: config.reconciler.timeout,
            success_threshold: config.reconciler.success_threshold,
            max_concurrency: config.reconciler.max_concurrency.max(1),
        }
    }

    pub fn report_url(&self, id: ScanProfileId) -> String {
        format!("{}/reports/{}", self.public_url, id)
    }

    pub fn error_url(&self, id: ScanErrorId) -> String {
        format!("{}/errors/{}", self.public_url, id)
    }

    /// Timeout window in whole minutes, as shown to users.
    pub fn timeout_minutes(&self) -> u64 {
        self.timeout.as_secs() / 60
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:9000".to_string(),
            timeout: Duration::from_secs(50 * 60),
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            max_concurrency: 8,
        }
    }
}

#[derive(Clone)]
pub struct ScanContext {
    pub profiles: Arc<dyn ScanProfileRepository>,
    pub releases: Arc<dyn ReleaseRepository>,
    pub errors: Arc<dyn ScanErrorRepository>,
    pub provider: Arc<dyn ScanProvider>,
    pub platform: Arc<dyn DeploymentPlatform>,
    pub archive: Arc<dyn ReportArchive>,
    pub settings: ScanSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_use_public_url() {
        let mut config = ScangateConfig::default();
        config.server.public_url = "https://scan.example.com/".to_string();
        let settings = ScanSettings::from_config(&config);

        let id = ScanProfileId::new();
        assert_eq!(settings.report_url(id), format!("https://scan.example.com/reports/{}", id));
        assert_eq!(settings.timeout_minutes(), 50);
    }
}
