// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate, following the Repository
//! pattern: one repository per aggregate root, interface defined in the
//! domain layer, implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ScanProfileRepository` | `ScanProfile` | `InMemoryScanProfileRepository`, `PostgresScanProfileRepository` |
//! | `ReleaseRepository` | `Release` | `InMemoryReleaseRepository`, `PostgresReleaseRepository` |
//! | `ScanErrorRepository` | `ScanError` | `InMemoryScanErrorRepository`, `PostgresScanErrorRepository` |
//!
//! Every mutating call is a single statement keyed by primary key (or one
//! transaction for [`ScanProfileRepository::record_terminal_error`]) so
//! repeating it after a partial failure is safe.

use async_trait::async_trait;
use crate::domain::release::Release;
use crate::domain::scan_error::{ScanError, ScanErrorId};
use crate::domain::scan_profile::{ScanProfile, ScanProfileId, ScanStatus};

/// Storage backend selection for repositories
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Repository interface for ScanProfile aggregates
#[async_trait]
pub trait ScanProfileRepository: Send + Sync {
    /// Save profile (create or update)
    async fn save(&self, profile: &ScanProfile) -> Result<(), RepositoryError>;

    /// Find profile by ID, including soft-deleted profiles
    async fn find_by_id(&self, id: ScanProfileId) -> Result<Option<ScanProfile>, RepositoryError>;

    /// Non-deleted profiles whose status is in [`ScanStatus::WORKING_SET`], newest first
    async fn list_working_set(&self) -> Result<Vec<ScanProfile>, RepositoryError>;

    /// Set the persisted status
    async fn update_status(&self, id: ScanProfileId, status: ScanStatus) -> Result<(), RepositoryError>;

    /// Persist a verdict status together with the archived report key, if any
    async fn record_verdict(
        &self,
        id: ScanProfileId,
        status: ScanStatus,
        report_key: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Insert `error` and set `status` in one transaction
    async fn record_terminal_error(
        &self,
        id: ScanProfileId,
        status: ScanStatus,
        error: &ScanError,
    ) -> Result<(), RepositoryError>;

    /// Mark the profile deleted
    async fn soft_delete(&self, id: ScanProfileId) -> Result<(), RepositoryError>;
}

/// Repository interface for Release aggregates
#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// Save release (create or update)
    async fn save(&self, release: &Release) -> Result<(), RepositoryError>;

    /// Find release by platform release ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Release>, RepositoryError>;

    /// Mark the release deleted
    async fn soft_delete(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Repository interface for ScanError records (write-once)
#[async_trait]
pub trait ScanErrorRepository: Send + Sync {
    async fn insert(&self, error: &ScanError) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: ScanErrorId) -> Result<Option<ScanError>, RepositoryError>;

    /// Errors linked to a profile, oldest first
    async fn find_by_profile(&self, profile_id: ScanProfileId) -> Result<Vec<ScanError>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
