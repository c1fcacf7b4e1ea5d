// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lifecycle error taxonomy
//!
//! Errors raised by the provisioner, the reconciler and the release hook.
//! Leaf errors from gateways and repositories are wrapped so callers can tell
//! which stage of the lifecycle failed.

use thiserror::Error;

use crate::domain::platform::PlatformError;
use crate::domain::repository::RepositoryError;
use crate::domain::scan_error::ErrorKind;
use crate::domain::scan_provider::ProviderError;
use crate::domain::storage::StorageError;

/// Provider call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStage {
    ListDomains,
    CreateProfile,
    StartScan,
    ScanStatus,
    FullReport,
    DeleteProfile,
}

impl ProviderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStage::ListDomains => "list_domains",
            ProviderStage::CreateProfile => "create_profile",
            ProviderStage::StartScan => "start_scan",
            ProviderStage::ScanStatus => "scan_status",
            ProviderStage::FullReport => "full_report",
            ProviderStage::DeleteProfile => "delete_profile",
        }
    }
}

impl std::fmt::Display for ProviderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("No registered scan domain matches host '{host}'")]
    DomainNotRegistered { host: String },

    #[error("Invalid target URL '{0}'")]
    InvalidTargetUrl(String),

    #[error("Scan provider call {stage} failed: {source}")]
    Provider {
        stage: ProviderStage,
        #[source]
        source: ProviderError,
    },

    #[error("Unable to fetch full scan report: {0}")]
    ReportFetch(#[source] ProviderError),

    #[error("Unable to archive scan report: {0}")]
    Archive(#[from] StorageError),

    #[error("Unable to report status to the deployment platform: {0}")]
    PlatformReport(#[from] PlatformError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] RepositoryError),
}

impl LifecycleError {
    pub fn provider(stage: ProviderStage, source: ProviderError) -> Self {
        LifecycleError::Provider { stage, source }
    }

    /// Response body returned by the provider, when the failure carries one.
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            LifecycleError::Provider { source, .. } | LifecycleError::ReportFetch(source) => source.body(),
            _ => None,
        }
    }

    /// Category shown to platform users when this error ends a scan.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Provider { source: ProviderError::Http { .. }, .. }
            | LifecycleError::ReportFetch(ProviderError::Http { .. }) => ErrorKind::ProviderApiError,
            LifecycleError::Provider { .. } | LifecycleError::ReportFetch(_) => ErrorKind::ProviderServiceError,
            _ => ErrorKind::ScanError,
        }
    }

    /// Whether the caller supplied an unusable request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LifecycleError::DomainNotRegistered { .. } | LifecycleError::InvalidTargetUrl(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_names_stage_and_keeps_body() {
        let err = LifecycleError::provider(
            ProviderStage::CreateProfile,
            ProviderError::Http { status: 400, body: Some("endpoint already exists".to_string()) },
        );
        assert!(err.to_string().starts_with("Scan provider call create_profile failed"));
        assert_eq!(err.upstream_body(), Some("endpoint already exists"));
        assert_eq!(err.kind(), ErrorKind::ProviderApiError);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_transport_failure_is_service_error() {
        let err = LifecycleError::provider(ProviderStage::ScanStatus, ProviderError::Transport("timed out".into()));
        assert_eq!(err.kind(), ErrorKind::ProviderServiceError);
        assert_eq!(err.upstream_body(), None);
    }

    #[test]
    fn test_client_errors() {
        assert!(LifecycleError::DomainNotRegistered { host: "a.b".into() }.is_client_error());
        assert!(LifecycleError::InvalidTargetUrl("nope".into()).is_client_error());
    }
}
