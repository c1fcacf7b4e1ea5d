// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Scripted scan provider and deployment platform shared by the integration tests.
//!
//! Both fakes append to one [`Journal`] so tests can assert the order of
//! external calls.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use scangate_core::application::reconciler::LifecycleReconciler;
use scangate_core::application::release_hook::ReleaseHookService;
use scangate_core::application::{ScanContext, ScanSettings};
use scangate_core::domain::platform::{AppDetails, DeploymentPlatform, PlatformError, StatusUpdate};
use scangate_core::domain::release::Release;
use scangate_core::domain::repository::{ReleaseRepository, ScanProfileRepository};
use scangate_core::domain::scan_profile::{ScanProfile, ScanStatus};
use scangate_core::domain::scan_provider::{
    FullReport, ProviderError, ProviderProfile, ProviderScanState, ScanDomain, ScanProvider,
};
use scangate_core::infrastructure::repositories::{
    InMemoryReleaseRepository, InMemoryScanErrorRepository, InMemoryScanProfileRepository,
};
use scangate_core::infrastructure::storage::MockReportArchive;

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub fn report(cvss: f64) -> FullReport {
    serde_json::from_value(json!({ "cvss": cvss, "findings": [{ "title": "Missing header" }] })).unwrap()
}

pub fn http_error(status: u16, body: &str) -> ProviderError {
    ProviderError::Http {
        status,
        body: Some(body.to_string()),
    }
}

pub struct FakeProvider {
    journal: Journal,
    domains: Mutex<Result<Vec<ScanDomain>, ProviderError>>,
    states: Mutex<HashMap<String, Result<ProviderScanState, ProviderError>>>,
    reports: Mutex<HashMap<String, Result<FullReport, ProviderError>>>,
    delete_failures: Mutex<HashMap<String, ProviderError>>,
    start_failure: Mutex<Option<ProviderError>>,
    initial_state: Mutex<ProviderScanState>,
    status_delay: Mutex<Option<Duration>>,
    next_token: AtomicUsize,
}

impl FakeProvider {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            domains: Mutex::new(Ok(vec![ScanDomain {
                name: "example.com".to_string(),
                token: "T1".to_string(),
            }])),
            states: Mutex::new(HashMap::new()),
            reports: Mutex::new(HashMap::new()),
            delete_failures: Mutex::new(HashMap::new()),
            start_failure: Mutex::new(None),
            initial_state: Mutex::new(ProviderScanState::Starting),
            status_delay: Mutex::new(None),
            next_token: AtomicUsize::new(1),
        }
    }

    pub fn set_domains(&self, domains: Result<Vec<ScanDomain>, ProviderError>) {
        *self.domains.lock().unwrap() = domains;
    }

    pub fn set_state(&self, token: &str, state: Result<ProviderScanState, ProviderError>) {
        self.states.lock().unwrap().insert(token.to_string(), state);
    }

    pub fn set_report(&self, token: &str, report: Result<FullReport, ProviderError>) {
        self.reports.lock().unwrap().insert(token.to_string(), report);
    }

    pub fn fail_delete(&self, token: &str, err: ProviderError) {
        self.delete_failures.lock().unwrap().insert(token.to_string(), err);
    }

    pub fn clear_delete_failure(&self, token: &str) {
        self.delete_failures.lock().unwrap().remove(token);
    }

    pub fn fail_start(&self, err: ProviderError) {
        *self.start_failure.lock().unwrap() = Some(err);
    }

    /// State reported for freshly created profiles.
    pub fn set_initial_state(&self, state: ProviderScanState) {
        *self.initial_state.lock().unwrap() = state;
    }

    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl ScanProvider for FakeProvider {
    async fn list_domains(&self) -> Result<Vec<ScanDomain>, ProviderError> {
        self.journal.push("provider:list_domains");
        self.domains.lock().unwrap().clone()
    }

    async fn create_profile(&self, domain_token: &str, host: &str) -> Result<ProviderProfile, ProviderError> {
        let token = format!("P{}", self.next_token.fetch_add(1, Ordering::SeqCst));
        self.journal.push(format!("provider:create_profile:{}:{}", domain_token, host));
        let initial = self.initial_state.lock().unwrap().clone();
        self.states.lock().unwrap().entry(token.clone()).or_insert(Ok(initial));
        Ok(ProviderProfile {
            token,
            name: format!("akkeris-{}", host),
            endpoint: host.to_string(),
        })
    }

    async fn delete_profile(&self, token: &str) -> Result<(), ProviderError> {
        self.journal.push(format!("provider:delete:{}", token));
        match self.delete_failures.lock().unwrap().get(token) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn start_scan(&self, token: &str) -> Result<(), ProviderError> {
        self.journal.push(format!("provider:start:{}", token));
        match self.start_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn scan_status(&self, token: &str) -> Result<ProviderScanState, ProviderError> {
        self.journal.push(format!("provider:status:{}", token));
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.states
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_else(|| Err(http_error(404, "profile not found")))
    }

    async fn full_report(&self, token: &str) -> Result<FullReport, ProviderError> {
        self.journal.push(format!("provider:report:{}", token));
        self.reports
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_else(|| Err(http_error(404, "no report")))
    }
}

pub struct FakePlatform {
    journal: Journal,
    apps: Mutex<HashMap<String, String>>,
    updates: Mutex<Vec<(String, StatusUpdate)>>,
    created: Mutex<Vec<(String, StatusUpdate)>>,
    fail_updates: Mutex<bool>,
}

impl FakePlatform {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            apps: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            fail_updates: Mutex::new(false),
        }
    }

    pub fn add_app(&self, name: &str, web_url: &str) {
        self.apps.lock().unwrap().insert(name.to_string(), web_url.to_string());
    }

    pub fn fail_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap() = fail;
    }

    /// Status updates sent to existing releases, in order.
    pub fn updates(&self) -> Vec<(String, StatusUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(String, StatusUpdate)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentPlatform for FakePlatform {
    async fn get_app(&self, _token: &str, app_name: &str) -> Result<AppDetails, PlatformError> {
        self.journal.push(format!("platform:get_app:{}", app_name));
        match self.apps.lock().unwrap().get(app_name) {
            Some(web_url) => Ok(AppDetails {
                name: app_name.to_string(),
                web_url: web_url.clone(),
            }),
            None => Err(PlatformError::Http {
                status: 404,
                body: Some("app not found".to_string()),
            }),
        }
    }

    async fn create_release_status(
        &self,
        _token: &str,
        _app_name: &str,
        release_id: &str,
        update: &StatusUpdate,
    ) -> Result<String, PlatformError> {
        self.journal.push(format!("platform:create_status:{}", release_id));
        self.created.lock().unwrap().push((release_id.to_string(), update.clone()));
        Ok(format!("status-{}", release_id))
    }

    async fn update_release_status(&self, release: &Release, update: &StatusUpdate) -> Result<(), PlatformError> {
        self.journal
            .push(format!("platform:update:{}:{}", release.id, update.state.as_str()));
        if *self.fail_updates.lock().unwrap() {
            return Err(PlatformError::Http {
                status: 503,
                body: None,
            });
        }
        self.updates.lock().unwrap().push((release.id.clone(), update.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub ctx: Arc<ScanContext>,
    pub provider: Arc<FakeProvider>,
    pub platform: Arc<FakePlatform>,
    pub archive: MockReportArchive,
    pub profiles: InMemoryScanProfileRepository,
    pub releases: InMemoryReleaseRepository,
    pub errors: InMemoryScanErrorRepository,
    pub journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(ScanSettings {
            public_url: "https://scan.example.com".to_string(),
            ..ScanSettings::default()
        })
    }

    pub fn with_settings(settings: ScanSettings) -> Self {
        let journal = Journal::default();
        let provider = Arc::new(FakeProvider::new(journal.clone()));
        let platform = Arc::new(FakePlatform::new(journal.clone()));
        let archive = MockReportArchive::new();
        let errors = InMemoryScanErrorRepository::new();
        let profiles = InMemoryScanProfileRepository::with_errors(errors.clone());
        let releases = InMemoryReleaseRepository::new();

        let ctx = Arc::new(ScanContext {
            profiles: Arc::new(profiles.clone()),
            releases: Arc::new(releases.clone()),
            errors: Arc::new(errors.clone()),
            provider: provider.clone(),
            platform: platform.clone(),
            archive: Arc::new(archive.clone()),
            settings,
        });

        Self {
            ctx,
            provider,
            platform,
            archive,
            profiles,
            releases,
            errors,
            journal,
        }
    }

    pub fn reconciler(&self) -> Arc<LifecycleReconciler> {
        Arc::new(LifecycleReconciler::new(self.ctx.clone()))
    }

    pub fn hooks(&self) -> ReleaseHookService {
        ReleaseHookService::new(self.ctx.clone(), self.reconciler())
    }

    /// Store a profile for provider token `token`, attached to a release
    /// `rel-{token}` when `with_release` is set.
    pub async fn seed_profile(
        &self,
        token: &str,
        status: ScanStatus,
        with_release: bool,
        age: chrono::Duration,
    ) -> ScanProfile {
        let mut profile = ScanProfile::new(
            ProviderProfile {
                token: token.to_string(),
                name: "akkeris-app.example.com".to_string(),
                endpoint: "app.example.com".to_string(),
            },
            "app",
        );
        profile.status = status;
        profile.created_at = Utc::now() - age;

        if with_release {
            let release_id = format!("rel-{}", token);
            let release = Release::new(
                release_id.clone(),
                "app",
                format!("status-{}", release_id),
                "platform-token",
                json!({ "key": "app", "action": "released" }),
            );
            self.releases.save(&release).await.unwrap();
            profile = profile.with_release(release_id);
        }

        self.profiles.save(&profile).await.unwrap();
        profile
    }

    pub async fn profile(&self, profile: &ScanProfile) -> ScanProfile {
        self.profiles.find_by_id(profile.id).await.unwrap().unwrap()
    }

    pub async fn release(&self, id: &str) -> Release {
        self.releases.find_by_id(id).await.unwrap().unwrap()
    }
}
