// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits defined in
//! `crate::domain::repository`.
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresScanProfileRepository** - Profile lifecycle state
//! - **PostgresReleaseRepository** - Release context captured from webhooks
//! - **PostgresScanErrorRepository** - Terminal failure records
//!
//! ## In-Memory Repositories
//!
//! HashMap-backed implementations for tests and `--in-memory` runs. The
//! profile repository shares its error store with
//! [`InMemoryScanErrorRepository`] so that
//! [`ScanProfileRepository::record_terminal_error`] stays atomic.
//!
//! # Usage
//!
//! ```no_run
//! # async fn example(database: scangate_core::infrastructure::db::Database) {
//! use scangate_core::infrastructure::repositories::create_repositories;
//! use scangate_core::domain::repository::StorageBackend;
//!
//! let repos = create_repositories(&StorageBackend::InMemory, None);
//! let working_set = repos.profiles.list_working_set().await;
//! # }
//! ```

pub mod postgres_scan_profile;
pub mod postgres_release;
pub mod postgres_scan_error;

pub use postgres_release::PostgresReleaseRepository;
pub use postgres_scan_error::PostgresScanErrorRepository;
pub use postgres_scan_profile::PostgresScanProfileRepository;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::release::Release;
use crate::domain::repository::{
    ReleaseRepository, RepositoryError, ScanErrorRepository, ScanProfileRepository, StorageBackend,
};
use crate::domain::scan_error::{ScanError, ScanErrorId};
use crate::domain::scan_profile::{ScanProfile, ScanProfileId, ScanStatus};
use crate::infrastructure::db::Database;

/// The three repositories the lifecycle needs, as trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub profiles: Arc<dyn ScanProfileRepository>,
    pub releases: Arc<dyn ReleaseRepository>,
    pub errors: Arc<dyn ScanErrorRepository>,
}

/// Build repositories for the configured backend.
///
/// Falls back to in-memory storage when PostgreSQL is selected but no
/// database handle is supplied.
pub fn create_repositories(backend: &StorageBackend, database: Option<&Database>) -> Repositories {
    match (backend, database) {
        (StorageBackend::PostgreSQL(_), Some(db)) => {
            let pool = db.get_pool().clone();
            Repositories {
                profiles: Arc::new(PostgresScanProfileRepository::new(pool.clone())),
                releases: Arc::new(PostgresReleaseRepository::new(pool.clone())),
                errors: Arc::new(PostgresScanErrorRepository::new(pool)),
            }
        }
        (StorageBackend::PostgreSQL(_), None) => {
            tracing::warn!("PostgreSQL selected without a database connection, using in-memory repositories");
            in_memory_repositories()
        }
        (StorageBackend::InMemory, _) => in_memory_repositories(),
    }
}

fn in_memory_repositories() -> Repositories {
    let errors = InMemoryScanErrorRepository::new();
    Repositories {
        profiles: Arc::new(InMemoryScanProfileRepository::with_errors(errors.clone())),
        releases: Arc::new(InMemoryReleaseRepository::new()),
        errors: Arc::new(errors),
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, RepositoryError> {
    lock.read().map_err(|_| RepositoryError::Unknown("Repository lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, RepositoryError> {
    lock.write().map_err(|_| RepositoryError::Unknown("Repository lock poisoned".to_string()))
}

fn check_save(fail: &AtomicBool, what: &str) -> Result<(), RepositoryError> {
    if fail.load(Ordering::SeqCst) {
        return Err(RepositoryError::Database(format!("Injected failure saving {}", what)));
    }
    Ok(())
}

#[derive(Clone, Default)]
pub struct InMemoryScanProfileRepository {
    profiles: Arc<RwLock<HashMap<ScanProfileId, ScanProfile>>>,
    errors: InMemoryScanErrorRepository,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryScanProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share `errors` as the store written by `record_terminal_error`.
    pub fn with_errors(errors: InMemoryScanErrorRepository) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    /// Make subsequent `save` calls fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn modify<F>(&self, id: ScanProfileId, f: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut ScanProfile),
    {
        let mut profiles = write(&self.profiles)?;
        let profile = profiles
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Scan profile {}", id)))?;
        f(profile);
        profile.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ScanProfileRepository for InMemoryScanProfileRepository {
    async fn save(&self, profile: &ScanProfile) -> Result<(), RepositoryError> {
        check_save(&self.fail_saves, "scan profile")?;
        let mut profiles = write(&self.profiles)?;
        profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ScanProfileId) -> Result<Option<ScanProfile>, RepositoryError> {
        let profiles = read(&self.profiles)?;
        Ok(profiles.get(&id).cloned())
    }

    async fn list_working_set(&self) -> Result<Vec<ScanProfile>, RepositoryError> {
        let profiles = read(&self.profiles)?;
        let mut working: Vec<ScanProfile> = profiles
            .values()
            .filter(|p| !p.deleted && ScanStatus::WORKING_SET.contains(&p.status))
            .cloned()
            .collect();
        working.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(working)
    }

    async fn update_status(&self, id: ScanProfileId, status: ScanStatus) -> Result<(), RepositoryError> {
        self.modify(id, |p| p.status = status)
    }

    async fn record_verdict(
        &self,
        id: ScanProfileId,
        status: ScanStatus,
        report_key: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.modify(id, |p| {
            p.status = status;
            if let Some(key) = report_key {
                p.report_key = Some(key.to_string());
            }
        })
    }

    async fn record_terminal_error(
        &self,
        id: ScanProfileId,
        status: ScanStatus,
        error: &ScanError,
    ) -> Result<(), RepositoryError> {
        // Both locks are held so the error and the status land together.
        let mut profiles = write(&self.profiles)?;
        let mut errors = write(&self.errors.errors)?;
        let profile = profiles
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Scan profile {}", id)))?;
        profile.status = status;
        profile.updated_at = Utc::now();
        errors.insert(error.id, error.clone());
        Ok(())
    }

    async fn soft_delete(&self, id: ScanProfileId) -> Result<(), RepositoryError> {
        self.modify(id, |p| p.deleted = true)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryReleaseRepository {
    releases: Arc<RwLock<HashMap<String, Release>>>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryReleaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReleaseRepository for InMemoryReleaseRepository {
    async fn save(&self, release: &Release) -> Result<(), RepositoryError> {
        check_save(&self.fail_saves, "release")?;
        let mut releases = write(&self.releases)?;
        releases.insert(release.id.clone(), release.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Release>, RepositoryError> {
        let releases = read(&self.releases)?;
        Ok(releases.get(id).cloned())
    }

    async fn soft_delete(&self, id: &str) -> Result<(), RepositoryError> {
        let mut releases = write(&self.releases)?;
        let release = releases
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Release {}", id)))?;
        release.deleted = true;
        release.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryScanErrorRepository {
    errors: Arc<RwLock<HashMap<ScanErrorId, ScanError>>>,
}

impl InMemoryScanErrorRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanErrorRepository for InMemoryScanErrorRepository {
    async fn insert(&self, error: &ScanError) -> Result<(), RepositoryError> {
        let mut errors = write(&self.errors)?;
        errors.insert(error.id, error.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ScanErrorId) -> Result<Option<ScanError>, RepositoryError> {
        let errors = read(&self.errors)?;
        Ok(errors.get(&id).cloned())
    }

    async fn find_by_profile(&self, profile_id: ScanProfileId) -> Result<Vec<ScanError>, RepositoryError> {
        let errors = read(&self.errors)?;
        let mut found: Vec<ScanError> = errors
            .values()
            .filter(|e| e.profile_id == Some(profile_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}
