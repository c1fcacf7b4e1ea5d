// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Scan Error
//!
//! Errors are write-once: inserts ignore an id that already exists and there
//! is no update path.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::repository::{RepositoryError, ScanErrorRepository};
use crate::domain::scan_error::{ScanError, ScanErrorId};
use crate::domain::scan_profile::ScanProfileId;

pub struct PostgresScanErrorRepository {
    pool: PgPool,
}

impl PostgresScanErrorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanErrorRepository for PostgresScanErrorRepository {
    async fn insert(&self, error: &ScanError) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO errors (id, description, release_id, profile_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(error.id.0)
        .bind(&error.description)
        .bind(&error.release_ref)
        .bind(error.profile_id.map(|p| p.0))
        .bind(error.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to insert scan error: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: ScanErrorId) -> Result<Option<ScanError>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, description, release_id, profile_id, created_at FROM errors WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(parse_error_row).transpose()
    }

    async fn find_by_profile(&self, profile_id: ScanProfileId) -> Result<Vec<ScanError>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, description, release_id, profile_id, created_at
            FROM errors
            WHERE profile_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(profile_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_error_row).collect()
    }
}

fn parse_error_row(row: PgRow) -> Result<ScanError, RepositoryError> {
    let profile_id: Option<Uuid> = row.try_get("profile_id")?;
    Ok(ScanError {
        id: ScanErrorId(row.try_get("id")?),
        description: row.try_get("description")?,
        release_ref: row.try_get("release_id")?,
        profile_id: profile_id.map(ScanProfileId),
        created_at: row.try_get("created_at")?,
    })
}
