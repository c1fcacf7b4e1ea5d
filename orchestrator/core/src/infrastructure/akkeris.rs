// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Akkeris Deployment Platform Client
//!
//! Implements [`DeploymentPlatform`] against the Akkeris app controller.
//!
//! # API Endpoints
//!
//! - `GET /apps/{app}` - App details (`web_url`)
//! - `POST /apps/{app}/releases/{release}/statuses` - Create release status
//! - `PATCH /apps/{app}/releases/{release}/statuses/{status}` - Update release status
//!
//! Requests are authorized with the token delivered alongside the webhook.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::domain::platform::{AppDetails, DeploymentPlatform, PlatformError, StatusUpdate};
use crate::domain::release::Release;

const STATUS_NAME: &str = "Detectify";
const STATUS_CONTEXT: &str = "security/detectify";

#[derive(Debug, Serialize)]
struct StatusPayload<'a> {
    state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    name: &'a str,
    description: &'a str,
    image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreatedStatus {
    id: String,
}

pub struct AkkerisClient {
    client: Client,
    /// App controller base URL
    api_url: String,
    /// Public base URL serving the status indicator images
    callback_url: String,
}

impl AkkerisClient {
    pub fn new(api_url: impl Into<String>, callback_url: impl Into<String>) -> Result<Self, PlatformError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            callback_url: callback_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn payload<'a>(&self, update: &'a StatusUpdate, context: Option<&'a str>) -> StatusPayload<'a> {
        StatusPayload {
            state: update.state.as_str(),
            context,
            name: STATUS_NAME,
            description: &update.description,
            image_url: format!("{}/{}", self.callback_url, update.state.image_name()),
            target_url: update.target_url.as_deref(),
        }
    }

    async fn checked(response: Response) -> Result<Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.ok().filter(|b| !b.trim().is_empty());
        Err(PlatformError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DeploymentPlatform for AkkerisClient {
    async fn get_app(&self, token: &str, app_name: &str) -> Result<AppDetails, PlatformError> {
        let response = self
            .client
            .get(self.build_url(&format!("/apps/{}", app_name)))
            .bearer_auth(token)
            .send()
            .await?;

        Ok(Self::checked(response).await?.json().await?)
    }

    async fn create_release_status(
        &self,
        token: &str,
        app_name: &str,
        release_id: &str,
        update: &StatusUpdate,
    ) -> Result<String, PlatformError> {
        let response = self
            .client
            .post(self.build_url(&format!("/apps/{}/releases/{}/statuses", app_name, release_id)))
            .bearer_auth(token)
            .json(&self.payload(update, Some(STATUS_CONTEXT)))
            .send()
            .await?;

        let created: CreatedStatus = Self::checked(response).await?.json().await?;
        Ok(created.id)
    }

    async fn update_release_status(&self, release: &Release, update: &StatusUpdate) -> Result<(), PlatformError> {
        let response = self
            .client
            .patch(self.build_url(&format!(
                "/apps/{}/releases/{}/statuses/{}",
                release.app_name, release.id, release.status_id
            )))
            .bearer_auth(&release.platform_token)
            .json(&self.payload(update, None))
            .send()
            .await?;

        Self::checked(response).await?;
        Ok(())
    }
}
