// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Token authentication for API requests
//!
//! Ad-hoc scan requests carry an `Authorization` header that is forwarded to
//! the auth host's `/user` endpoint. A 2xx answer accepts the token and a
//! 401 rejects it; anything else is an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication service responded with HTTP {0}")]
    Http(u16),
}

#[async_trait]
pub trait TokenAuthenticator: Send + Sync {
    /// Whether `token` identifies a known user.
    async fn is_authenticated(&self, token: &str) -> Result<bool, AuthError>;
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    #[serde(default)]
    cn: Option<String>,
}

pub struct HttpTokenAuthenticator {
    client: Client,
    auth_host: String,
}

impl HttpTokenAuthenticator {
    pub fn new(auth_host: impl Into<String>) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            auth_host: auth_host.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TokenAuthenticator for HttpTokenAuthenticator {
    async fn is_authenticated(&self, token: &str) -> Result<bool, AuthError> {
        let response = self
            .client
            .get(format!("{}/user", self.auth_host))
            .header(reqwest::header::AUTHORIZATION, token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user: AuthUser = response.json().await.unwrap_or(AuthUser { cn: None });
                info!(user = user.cn.as_deref().unwrap_or("unknown"), "User authenticated");
                Ok(true)
            }
            StatusCode::UNAUTHORIZED => Ok(false),
            status => Err(AuthError::Http(status.as_u16())),
        }
    }
}

/// Accepts every token. Used when no auth host is configured.
pub struct AllowAllAuthenticator;

#[async_trait]
impl TokenAuthenticator for AllowAllAuthenticator {
    async fn is_authenticated(&self, _token: &str) -> Result<bool, AuthError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_forwarded_to_user_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/user")
            .match_header("authorization", "Bearer good")
            .with_status(200)
            .with_body(r#"{"cn":"jane"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/user")
            .match_header("authorization", "Bearer bad")
            .with_status(401)
            .create_async()
            .await;

        let auth = HttpTokenAuthenticator::new(server.url()).unwrap();
        assert!(auth.is_authenticated("Bearer good").await.unwrap());
        assert!(!auth.is_authenticated("Bearer bad").await.unwrap());
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_unexpected_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/user").with_status(503).create_async().await;

        let auth = HttpTokenAuthenticator::new(server.url()).unwrap();
        assert!(matches!(auth.is_authenticated("t").await, Err(AuthError::Http(503))));
    }
}
