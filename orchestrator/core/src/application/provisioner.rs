// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Scan Provisioner
//!
//! Creates provider-side scan profiles for a target URL and starts scans.
//! The provisioner has no persistence side effects; callers store the
//! returned profile.

use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use crate::application::errors::{LifecycleError, ProviderStage};
use crate::domain::scan_profile::ScanProfile;
use crate::domain::scan_provider::{ProviderScanState, ScanDomain, ScanProvider};

pub struct ScanProvisioner {
    provider: Arc<dyn ScanProvider>,
}

impl ScanProvisioner {
    pub fn new(provider: Arc<dyn ScanProvider>) -> Self {
        Self { provider }
    }

    /// Create a scan profile for `target_url`.
    ///
    /// The returned profile is at `profile_created` with its provider token set.
    pub async fn provision(&self, target_url: &str, app_name: &str) -> Result<ScanProfile, LifecycleError> {
        let domains = self
            .provider
            .list_domains()
            .await
            .map_err(|e| LifecycleError::provider(ProviderStage::ListDomains, e))?;

        let host = target_host(target_url)?;
        let domain = select_domain(&domains, &host)
            .ok_or_else(|| LifecycleError::DomainNotRegistered { host: host.clone() })?;
        debug!(host = %host, domain = %domain.name, "Matched scan domain");

        let provider_profile = self
            .provider
            .create_profile(&domain.token, &host)
            .await
            .map_err(|e| LifecycleError::provider(ProviderStage::CreateProfile, e))?;

        info!(
            host = %host,
            app = %app_name,
            token = %provider_profile.token,
            "Created scan profile"
        );

        Ok(ScanProfile::new(provider_profile, app_name))
    }

    /// Start a scan on `profile` and return the provider's initial state.
    pub async fn start(&self, profile: &ScanProfile) -> Result<ProviderScanState, LifecycleError> {
        self.provider
            .start_scan(&profile.provider_token)
            .await
            .map_err(|e| LifecycleError::provider(ProviderStage::StartScan, e))?;

        let state = self
            .provider
            .scan_status(&profile.provider_token)
            .await
            .map_err(|e| LifecycleError::provider(ProviderStage::ScanStatus, e))?;

        info!(profile_id = %profile.id, state = %state, "Started scan");
        Ok(state)
    }
}

fn target_host(target_url: &str) -> Result<String, LifecycleError> {
    let url = Url::parse(target_url.trim())
        .map_err(|_| LifecycleError::InvalidTargetUrl(target_url.to_string()))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.trim_end_matches('.').to_ascii_lowercase()),
        _ => Err(LifecycleError::InvalidTargetUrl(target_url.to_string())),
    }
}

/// Pick the registered domain covering `host`.
///
/// A domain covers a host when the host equals it or ends with `.{domain}`;
/// the longest covering domain wins.
pub fn select_domain<'a>(domains: &'a [ScanDomain], host: &str) -> Option<&'a ScanDomain> {
    let host = host.to_ascii_lowercase();
    domains
        .iter()
        .filter(|d| {
            let name = d.name.trim_end_matches('.').to_ascii_lowercase();
            !name.is_empty()
                && (host == name
                    || host
                        .strip_suffix(name.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.')))
        })
        .max_by_key(|d| d.name.trim_end_matches('.').len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(name: &str, token: &str) -> ScanDomain {
        ScanDomain { name: name.to_string(), token: token.to_string() }
    }

    #[test]
    fn test_select_domain_on_label_boundary() {
        let domains = vec![domain("example.com", "T1")];
        assert_eq!(select_domain(&domains, "app.example.com").map(|d| d.token.as_str()), Some("T1"));
        assert_eq!(select_domain(&domains, "example.com").map(|d| d.token.as_str()), Some("T1"));
        assert!(select_domain(&domains, "badexample.com").is_none());
        assert!(select_domain(&domains, "app.other.com").is_none());
    }

    #[test]
    fn test_longest_domain_wins() {
        let domains = vec![domain("example.com", "T1"), domain("apps.example.com", "T2")];
        assert_eq!(
            select_domain(&domains, "web.apps.example.com").map(|d| d.token.as_str()),
            Some("T2")
        );
        assert_eq!(select_domain(&domains, "web.example.com").map(|d| d.token.as_str()), Some("T1"));
    }

    #[test]
    fn test_target_host() {
        assert_eq!(target_host("https://App.Example.com/path?q=1").unwrap(), "app.example.com");
        assert!(matches!(target_host("not a url"), Err(LifecycleError::InvalidTargetUrl(_))));
        assert!(matches!(target_host("mailto:someone"), Err(LifecycleError::InvalidTargetUrl(_))));
    }
}
