// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Harness;
use scangate_core::application::release_hook::ReleaseHookService;
use scangate_core::domain::repository::{ScanErrorRepository, ScanProfileRepository};
use scangate_core::domain::scan_error::ScanError;
use scangate_core::domain::scan_profile::ScanStatus;
use scangate_core::domain::storage::ReportArchive;
use scangate_core::infrastructure::auth::{AllowAllAuthenticator, AuthError, TokenAuthenticator};
use scangate_core::presentation::api::{app, AppState};

struct RejectAll;

#[async_trait]
impl TokenAuthenticator for RejectAll {
    async fn is_authenticated(&self, _token: &str) -> Result<bool, AuthError> {
        Ok(false)
    }
}

fn router_with(h: &Harness, auth: Arc<dyn TokenAuthenticator>) -> Router {
    app(AppState {
        ctx: h.ctx.clone(),
        hooks: Arc::new(ReleaseHookService::new(h.ctx.clone(), h.reconciler())),
        auth,
        ui_url: Some("https://apps.example.com/".to_string()),
        start_time: Instant::now(),
    })
}

fn router(h: &Harness) -> Router {
    router_with(h, Arc::new(AllowAllAuthenticator))
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, headers: &[(&str, &str)], body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn as_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let (status, body) = send(router(&h), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["status"], "healthy");
}

#[tokio::test]
async fn test_hook_rejects_malformed_payloads() {
    let h = Harness::new();
    let valid = json!({ "key": "app", "action": "released", "release": { "id": "rel-1" } });

    // No platform token.
    let (status, body) = send(router(&h), post_json("/v1/hook/released", &[], &valid)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(String::from_utf8(body).unwrap(), "Payload did not match expected format");

    let wrong_action = json!({ "key": "app", "action": "build", "release": { "id": "rel-1" } });
    let (status, _) = send(
        router(&h),
        post_json("/v1/hook/released", &[("x-akkeris-token", "t")], &wrong_action),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/hook/released")
        .header("x-akkeris-token", "t")
        .body(Body::from("not json"))
        .unwrap();
    let (status, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(h.journal.entries().is_empty());
}

#[tokio::test]
async fn test_hook_acknowledges_then_starts_scan() {
    let h = Harness::new();
    h.platform.add_app("app", "https://app.example.com");
    let event = json!({ "key": "app", "action": "released", "release": { "id": "rel-1" } });

    let (status, body) = send(
        router(&h),
        post_json("/v1/hook/released", &[("x-akkeris-token", "platform-token")], &event),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let mut profiles = Vec::new();
    for _ in 0..100 {
        profiles = h.profiles.list_working_set().await.unwrap();
        if profiles.iter().any(|p| p.status == ScanStatus::Starting) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].release_ref.as_deref(), Some("rel-1"));
    assert_eq!(h.release("rel-1").await.platform_token, "platform-token");
}

#[tokio::test]
async fn test_create_scan_requires_authorization() {
    let h = Harness::new();
    let request = json!({ "url": "https://svc.example.com" });

    let (status, _) = send(router(&h), post_json("/v1/scans", &[], &request)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        router_with(&h, Arc::new(RejectAll)),
        post_json("/v1/scans", &[("authorization", "Bearer nope")], &request),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.journal.count("provider:"), 0);
}

#[tokio::test]
async fn test_create_scan_returns_started_profile() {
    let h = Harness::new();
    let request = json!({ "url": "https://svc.example.com", "success_threshold": 4.5 });

    let (status, body) = send(
        router(&h),
        post_json("/v1/scans", &[("authorization", "Bearer ok")], &request),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let profile = as_json(&body);
    assert_eq!(profile["status"], "starting");
    assert_eq!(profile["target_url"], "svc.example.com");
    assert_eq!(profile["success_threshold"], 4.5);

    let (status, body) = send(router(&h), get("/v1/scans")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body).as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_scan_validates_request() {
    let h = Harness::new();
    let auth = [("authorization", "Bearer ok")];

    let (status, _) = send(
        router(&h),
        post_json("/v1/scans", &auth, &json!({ "url": "https://svc.example.com", "success_threshold": 11 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(router(&h), post_json("/v1/scans", &auth, &json!({ "target": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        router(&h),
        post_json("/v1/scans", &auth, &json!({ "url": "https://svc.other.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(as_json(&body)["error"].as_str().unwrap().contains("svc.other.com"));
}

#[tokio::test]
async fn test_provider_failure_maps_to_bad_gateway_with_upstream() {
    let h = Harness::new();
    h.provider.set_domains(Err(common::http_error(401, "bad api key")));

    let (status, body) = send(
        router(&h),
        post_json("/v1/scans", &[("authorization", "Bearer ok")], &json!({ "url": "https://svc.example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(as_json(&body)["upstream"], "bad api key");
}

#[tokio::test]
async fn test_profile_lookup() {
    let h = Harness::new();
    let profile = h.seed_profile("P1", ScanStatus::Running, false, chrono::Duration::minutes(1)).await;

    let (status, body) = send(router(&h), get(&format!("/v1/profiles/{}", profile.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["provider_token"], "P1");

    let (status, _) = send(router(&h), get("/v1/profiles/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(router(&h), get(&format!("/v1/profiles/{}", uuid::Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_report_served_from_archive() {
    let h = Harness::new();
    let mut profile = h.seed_profile("P1", ScanStatus::Running, false, chrono::Duration::minutes(1)).await;

    let (status, _) = send(router(&h), get(&format!("/reports/{}", profile.id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    h.archive
        .put("P1_1.json", br#"{"cvss":3.1,"findings":[]}"#.to_vec(), HashMap::new())
        .await
        .unwrap();
    profile.status = ScanStatus::Success;
    profile.report_key = Some("P1_1.json".to_string());
    h.profiles.save(&profile).await.unwrap();

    for uri in [format!("/reports/{}", profile.id), format!("/v1/reports/{}", profile.id)] {
        let (status, body) = send(router(&h), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&body)["cvss"], 3.1);
    }
}

#[tokio::test]
async fn test_missing_archived_object_is_server_error() {
    let h = Harness::new();
    let mut profile = h.seed_profile("P1", ScanStatus::Success, false, chrono::Duration::minutes(1)).await;
    profile.report_key = Some("P1_404.json".to_string());
    h.profiles.save(&profile).await.unwrap();

    let (status, _) = send(router(&h), get(&format!("/reports/{}", profile.id))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_error_details_link_back_to_app() {
    let h = Harness::new();
    let profile = h.seed_profile("P1", ScanStatus::Error, true, chrono::Duration::minutes(1)).await;
    let scan_error = ScanError::new(
        "Scan returned with an error: unable_to_resolve",
        profile.release_ref.clone(),
        Some(profile.id),
    );
    h.errors.insert(&scan_error).await.unwrap();

    let (status, body) = send(router(&h), get(&format!("/errors/{}", scan_error.id))).await;
    assert_eq!(status, StatusCode::OK);

    let details = as_json(&body);
    assert_eq!(details["description"], "Scan returned with an error: unable_to_resolve");
    assert_eq!(details["app_name"], "app");
    assert_eq!(details["scan_status"], "error");
    assert_eq!(details["app_url"], "https://apps.example.com/apps/app");
    assert_eq!(details["release_url"], "https://apps.example.com/apps/app/releases");

    let (status, _) = send(router(&h), get("/errors/garbage")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(router(&h), get(&format!("/errors/{}", uuid::Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
