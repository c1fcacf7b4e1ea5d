// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Release
//!
//! Deployment context captured from a platform "released" event. A release
//! carries the status handle scangate PATCHes with scan progress and the
//! platform token the event was delivered with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Platform-assigned release identifier.
    pub id: String,
    pub app_name: String,
    /// Release status created on the platform for this scan.
    pub status_id: String,
    /// Token used to call the platform on behalf of this release.
    #[serde(skip_serializing, default)]
    pub platform_token: String,
    /// Webhook body as received.
    pub payload: serde_json::Value,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Release {
    pub fn new(
        id: impl Into<String>,
        app_name: impl Into<String>,
        status_id: impl Into<String>,
        platform_token: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            app_name: app_name.into(),
            status_id: status_id.into(),
            platform_token: platform_token.into(),
            payload,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}
