// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Detectify Scan Provider Client
//!
//! Implements [`ScanProvider`] against the Detectify REST API (v2).
//!
//! # API Endpoints
//!
//! - `GET /rest/v2/domains/` - Domains the key may scan
//! - `POST /rest/v2/profiles/` - Create scan profile
//! - `DELETE /rest/v2/profiles/{token}/` - Delete scan profile
//! - `POST /rest/v2/scans/{token}/` - Start scan
//! - `GET /rest/v2/scans/{token}/` - Scan state
//! - `GET /rest/v2/fullreports/{token}/latest/` - Latest full report
//!
//! Every request carries the `X-Detectify-Key` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;

use crate::domain::scan_provider::{
    FullReport, ProviderError, ProviderProfile, ProviderScanState, ScanDomain, ScanProvider, ScanStatusReport,
};

const API_KEY_HEADER: &str = "X-Detectify-Key";

#[derive(Debug, Serialize)]
struct CreateProfileRequest<'a> {
    domain_token: &'a str,
    name: String,
    endpoint: &'a str,
    unique: bool,
    valid: bool,
}

pub struct DetectifyClient {
    client: Client,
    /// API base URL (e.g., "https://api.detectify.com")
    api_url: String,
    api_key: String,
}

impl DetectifyClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_timeout(api_url, api_key, Duration::from_secs(30))
    }

    /// Create client with custom timeout
    pub fn with_timeout(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}/rest/v2{}", self.api_url, path)
    }

    async fn checked(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.ok().filter(|b| !b.trim().is_empty());
        Err(ProviderError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ScanProvider for DetectifyClient {
    async fn list_domains(&self) -> Result<Vec<ScanDomain>, ProviderError> {
        let response = self
            .client
            .get(self.build_url("/domains/"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Ok(Self::checked(response).await?.json().await?)
    }

    async fn create_profile(&self, domain_token: &str, host: &str) -> Result<ProviderProfile, ProviderError> {
        let request = CreateProfileRequest {
            domain_token,
            name: format!("akkeris-{}", host),
            endpoint: host,
            unique: false,
            valid: false,
        };

        let response = self
            .client
            .post(self.build_url("/profiles/"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        Ok(Self::checked(response).await?.json().await?)
    }

    async fn delete_profile(&self, token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.build_url(&format!("/profiles/{}/", token)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Self::checked(response).await?;
        Ok(())
    }

    async fn start_scan(&self, token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.build_url(&format!("/scans/{}/", token)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Self::checked(response).await?;
        Ok(())
    }

    async fn scan_status(&self, token: &str) -> Result<ProviderScanState, ProviderError> {
        let response = self
            .client
            .get(self.build_url(&format!("/scans/{}/", token)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let report: ScanStatusReport = Self::checked(response).await?.json().await?;
        Ok(report.state)
    }

    async fn full_report(&self, token: &str) -> Result<FullReport, ProviderError> {
        let response = self
            .client
            .get(self.build_url(&format!("/fullreports/{}/latest/", token)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Ok(Self::checked(response).await?.json().await?)
    }
}
