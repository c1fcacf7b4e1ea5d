// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! HTTP API
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /v1/hook/released` | Platform release webhook, processed in the background |
//! | `POST /v1/scans` | Authenticated ad-hoc scan |
//! | `GET /v1/scans` | Scans in the working set, newest first |
//! | `GET /v1/profiles/{id}` | Scan profile |
//! | `GET /v1/reports/{id}`, `GET /reports/{id}` | Archived report |
//! | `GET /errors/{id}` | Error details linked from release statuses |
//! | `GET /health` | Liveness |

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::application::context::ScanContext;
use crate::application::errors::LifecycleError;
use crate::application::release_hook::{AdHocScanRequest, ReleaseHookService, ReleasedEvent};
use crate::domain::repository::RepositoryError;
use crate::domain::scan_error::{ScanError, ScanErrorId};
use crate::domain::scan_profile::{ScanProfile, ScanProfileId};
use crate::infrastructure::auth::TokenAuthenticator;

const PLATFORM_TOKEN_HEADER: &str = "x-akkeris-token";

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<ScanContext>,
    pub hooks: Arc<ReleaseHookService>,
    pub auth: Arc<dyn TokenAuthenticator>,
    /// Platform UI base URL for links in error details
    pub ui_url: Option<String>,
    pub start_time: Instant,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/hook/released", post(hook_released))
        .route("/v1/scans", get(list_scans).post(create_scan))
        .route("/v1/profiles/{id}", get(get_profile))
        .route("/v1/reports/{id}", get(get_report))
        .route("/reports/{id}", get(get_report))
        .route("/errors/{id}", get(get_error))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    upstream: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            upstream: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.message });
        if let Some(upstream) = self.upstream {
            body["upstream"] = json!(upstream);
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        let status = match &err {
            LifecycleError::DomainNotRegistered { .. } | LifecycleError::InvalidTargetUrl(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LifecycleError::Provider { .. }
            | LifecycleError::ReportFetch(_)
            | LifecycleError::PlatformReport(_) => StatusCode::BAD_GATEWAY,
            LifecycleError::Archive(_) | LifecycleError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
            upstream: err.upstream_body().map(str::to_string),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        error!(error = %err, "Repository failure while serving request");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn hook_released(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let token = headers
        .get(PLATFORM_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let event = match ReleasedEvent::parse(&payload, token.as_deref()) {
        Ok(event) => event,
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    };
    let token = token.unwrap_or_default();

    let hooks = state.hooks.clone();
    tokio::spawn(async move {
        if let Err(e) = hooks.handle_released(&event, &token, payload).await {
            warn!(app = %event.key, release_id = %event.release_id(), error = %e, "Release scan setup failed");
        }
    });

    (StatusCode::OK, "OK").into_response()
}

async fn create_scan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ScanProfile>), ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

    match state.auth.is_authenticated(token).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized")),
        Err(e) => {
            error!(error = %e, "Authentication check failed");
            return Err(ApiError::new(StatusCode::BAD_GATEWAY, "Unable to verify credentials"));
        }
    }

    let request: AdHocScanRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)))?;
    if let Some(threshold) = request.success_threshold {
        if !(0.0..=10.0).contains(&threshold) {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "success_threshold must be between 0 and 10",
            ));
        }
    }

    let profile = state.hooks.start_adhoc(&request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn list_scans(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ScanProfile>>, ApiError> {
    Ok(Json(state.ctx.profiles.list_working_set().await?))
}

async fn find_profile(state: &AppState, id: &str) -> Result<ScanProfile, ApiError> {
    let id = ScanProfileId::from_string(id).map_err(|_| ApiError::new(StatusCode::NOT_FOUND, "Scan profile not found"))?;
    state
        .ctx
        .profiles
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Scan profile not found"))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScanProfile>, ApiError> {
    Ok(Json(find_profile(&state, &id).await?))
}

async fn get_report(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let profile = find_profile(&state, &id).await?;
    let key = profile
        .report_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "No report archived for this scan profile yet"))?;

    let bytes = state.ctx.archive.get(key).await.map_err(|e| {
        error!(profile_id = %profile.id, key = %key, error = %e, "Failed to read archived report");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Unable to read archived report")
    })?;

    let report: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
        error!(profile_id = %profile.id, error = %e, "Archived report is not valid JSON");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Archived report is corrupt")
    })?;
    Ok(Json(report).into_response())
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    #[serde(flatten)]
    error: ScanError,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    release_url: Option<String>,
}

async fn get_error(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ErrorDetails>, ApiError> {
    let id = ScanErrorId::from_string(&id).map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Invalid error id"))?;
    let scan_error = state
        .ctx
        .errors
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Requested error details not found"))?;

    let scan_status = match scan_error.profile_id {
        Some(profile_id) => state
            .ctx
            .profiles
            .find_by_id(profile_id)
            .await?
            .map(|p| p.status.to_string()),
        None => None,
    };
    let app_name = match &scan_error.release_ref {
        Some(release_id) => state.ctx.releases.find_by_id(release_id).await?.map(|r| r.app_name),
        None => None,
    };

    let ui_url = state.ui_url.as_deref().map(|u| u.trim_end_matches('/'));
    let (app_url, release_url) = match (ui_url, &app_name) {
        (Some(ui), Some(app)) => (
            Some(format!("{}/apps/{}", ui, app)),
            Some(format!("{}/apps/{}/releases", ui, app)),
        ),
        _ => (None, None),
    };

    Ok(Json(ErrorDetails {
        error: scan_error,
        app_name,
        scan_status,
        app_url,
        release_url,
    }))
}
