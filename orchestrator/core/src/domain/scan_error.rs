// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Scan Error
//!
//! Write-once record of a terminal failure. The id is exposed to platform
//! users through the `/errors/{id}` link attached to `error` release statuses.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::scan_profile::ScanProfileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanErrorId(pub Uuid);

impl ScanErrorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ScanErrorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short category shown to platform users next to the error link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Timeout,
    ScanError,
    ProviderApiError,
    ProviderServiceError,
    /// Provisioning failed before a scan could start.
    ProviderError,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ScanError => "Scan Error",
            ErrorKind::ProviderApiError => "Scan Provider API Error",
            ErrorKind::ProviderServiceError => "Scan Provider Service Error",
            ErrorKind::ProviderError => "Scan Provider Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanError {
    pub id: ScanErrorId,
    pub description: String,
    pub release_ref: Option<String>,
    pub profile_id: Option<ScanProfileId>,
    pub created_at: DateTime<Utc>,
}

impl ScanError {
    pub fn new(
        description: impl Into<String>,
        release_ref: Option<String>,
        profile_id: Option<ScanProfileId>,
    ) -> Self {
        Self {
            id: ScanErrorId::new(),
            description: description.into(),
            release_ref,
            profile_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_error_links_profile_and_release() {
        let profile_id = ScanProfileId::new();
        let err = ScanError::new("Scan returned with an error: unable_to_resolve", Some("rel-1".into()), Some(profile_id));
        assert_eq!(err.profile_id, Some(profile_id));
        assert_eq!(err.release_ref.as_deref(), Some("rel-1"));
        assert_ne!(err.id, ScanError::new("other", None, None).id);
    }

    #[test]
    fn test_error_id_parse() {
        assert!(ScanErrorId::from_string("not-a-uuid").is_err());
        let id = ScanErrorId::new();
        assert_eq!(ScanErrorId::from_string(&id.to_string()).unwrap(), id);
    }
}
