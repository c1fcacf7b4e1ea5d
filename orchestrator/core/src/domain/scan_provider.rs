// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Scan Provider Trait - Anti-Corruption Layer for the external scanner
//!
//! Isolates the lifecycle from the scanning provider's REST API. The only
//! production implementation is
//! [`DetectifyClient`](crate::infrastructure::detectify::DetectifyClient);
//! tests substitute scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A domain the provider account is authorized to scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDomain {
    pub name: String,
    pub token: String,
}

/// Provider-side profile returned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub token: String,
    pub name: String,
    pub endpoint: String,
}

/// Scan state as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderScanState {
    Starting,
    Running,
    Stopping,
    Stopped,
    UnableToResolve,
    UnableToComplete,
    Other(String),
}

impl ProviderScanState {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderScanState::Starting => "starting",
            ProviderScanState::Running => "running",
            ProviderScanState::Stopping => "stopping",
            ProviderScanState::Stopped => "stopped",
            ProviderScanState::UnableToResolve => "unable_to_resolve",
            ProviderScanState::UnableToComplete => "unable_to_complete",
            ProviderScanState::Other(s) => s,
        }
    }

    /// States in which the provider gave up on the scan.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ProviderScanState::UnableToResolve | ProviderScanState::UnableToComplete
        )
    }
}

impl From<String> for ProviderScanState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "starting" => ProviderScanState::Starting,
            "running" => ProviderScanState::Running,
            "stopping" => ProviderScanState::Stopping,
            "stopped" => ProviderScanState::Stopped,
            "unable_to_resolve" => ProviderScanState::UnableToResolve,
            "unable_to_complete" => ProviderScanState::UnableToComplete,
            _ => ProviderScanState::Other(s),
        }
    }
}

impl From<ProviderScanState> for String {
    fn from(state: ProviderScanState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for ProviderScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatusReport {
    pub state: ProviderScanState,
}

/// Full report of the latest scan on a profile.
///
/// Unknown fields are preserved so the archived document matches what the
/// provider returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullReport {
    /// Aggregate severity score on a 0–10 scale.
    pub cvss: f64,
    #[serde(default)]
    pub findings: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FullReport {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[async_trait]
pub trait ScanProvider: Send + Sync {
    /// List every domain the account may scan.
    async fn list_domains(&self) -> Result<Vec<ScanDomain>, ProviderError>;

    /// Create a scan profile for `host` under the domain identified by `domain_token`.
    async fn create_profile(&self, domain_token: &str, host: &str) -> Result<ProviderProfile, ProviderError>;

    async fn delete_profile(&self, token: &str) -> Result<(), ProviderError>;

    async fn start_scan(&self, token: &str) -> Result<(), ProviderError>;

    async fn scan_status(&self, token: &str) -> Result<ProviderScanState, ProviderError>;

    async fn full_report(&self, token: &str) -> Result<FullReport, ProviderError>;
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request to scan provider failed: {0}")]
    Transport(String),

    #[error("Scan provider responded with HTTP {status}{}", .body.as_deref().map(|b| format!(": {b}")).unwrap_or_default())]
    Http { status: u16, body: Option<String> },

    #[error("Unexpected response from scan provider: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Upstream response body, when the provider sent one.
    pub fn body(&self) -> Option<&str> {
        match self {
            ProviderError::Http { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parses_known_and_unknown() {
        let s: ScanStatusReport = serde_json::from_str(r#"{"state":"unable_to_resolve"}"#).unwrap();
        assert_eq!(s.state, ProviderScanState::UnableToResolve);
        assert!(s.state.is_error());

        let s: ScanStatusReport = serde_json::from_str(r#"{"state":"queued"}"#).unwrap();
        assert_eq!(s.state, ProviderScanState::Other("queued".to_string()));
        assert!(!s.state.is_error());
    }

    #[test]
    fn test_full_report_keeps_unknown_fields() {
        let body = r#"{"cvss":4.2,"findings":[{"title":"xss"}],"scan_profile_token":"abc"}"#;
        let report: FullReport = serde_json::from_str(body).unwrap();
        assert_eq!(report.cvss, 4.2);
        assert_eq!(report.findings.len(), 1);

        let archived: serde_json::Value = serde_json::from_slice(&report.to_json_bytes().unwrap()).unwrap();
        assert_eq!(archived["scan_profile_token"], "abc");
        assert_eq!(archived["findings"][0]["title"], "xss");
    }

    #[test]
    fn test_http_error_message_includes_body() {
        let err = ProviderError::Http { status: 403, body: Some("{\"error\":\"forbidden\"}".to_string()) };
        assert_eq!(err.to_string(), "Scan provider responded with HTTP 403: {\"error\":\"forbidden\"}");
        assert_eq!(err.body(), Some("{\"error\":\"forbidden\"}"));

        let err = ProviderError::Http { status: 500, body: None };
        assert_eq!(err.to_string(), "Scan provider responded with HTTP 500");
    }
}
