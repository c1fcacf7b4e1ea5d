// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Scan Profile
//!
//! `scan_profiles` table access. Each mutation is a single statement keyed by
//! id; `record_terminal_error` wraps the error insert and the status change
//! in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::repository::{RepositoryError, ScanProfileRepository};
use crate::domain::scan_error::ScanError;
use crate::domain::scan_profile::{ScanProfile, ScanProfileId, ScanStatus};

const PROFILE_COLUMNS: &str = r#"
    id, provider_token, name, target_app, target_url, release_id, status,
    report_key, success_threshold, deleted, created_at, updated_at
"#;

pub struct PostgresScanProfileRepository {
    pool: PgPool,
}

impl PostgresScanProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn working_set_statuses() -> Vec<String> {
    ScanStatus::WORKING_SET.iter().map(|s| s.as_str().to_string()).collect()
}

fn not_found_if_empty(rows_affected: u64, id: ScanProfileId) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        return Err(RepositoryError::NotFound(format!("Scan profile {}", id)));
    }
    Ok(())
}

#[async_trait]
impl ScanProfileRepository for PostgresScanProfileRepository {
    async fn save(&self, profile: &ScanProfile) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO scan_profiles (
                id, provider_token, name, target_app, target_url, release_id, status,
                report_key, success_threshold, deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                report_key = EXCLUDED.report_key,
                success_threshold = EXCLUDED.success_threshold,
                deleted = EXCLUDED.deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.id.0)
        .bind(&profile.provider_token)
        .bind(&profile.name)
        .bind(&profile.target_app)
        .bind(&profile.target_url)
        .bind(&profile.release_ref)
        .bind(profile.status.as_str())
        .bind(&profile.report_key)
        .bind(profile.success_threshold)
        .bind(profile.deleted)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save scan profile: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: ScanProfileId) -> Result<Option<ScanProfile>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM scan_profiles WHERE id = $1", PROFILE_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(parse_profile_row).transpose()
    }

    async fn list_working_set(&self) -> Result<Vec<ScanProfile>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM scan_profiles
            WHERE deleted = FALSE AND status = ANY($1)
            ORDER BY created_at DESC
            "#,
            PROFILE_COLUMNS
        ))
        .bind(working_set_statuses())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_profile_row).collect()
    }

    async fn update_status(&self, id: ScanProfileId, status: ScanStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE scan_profiles SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id.0)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        not_found_if_empty(result.rows_affected(), id)
    }

    async fn record_verdict(
        &self,
        id: ScanProfileId,
        status: ScanStatus,
        report_key: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE scan_profiles
            SET status = $2, report_key = COALESCE($3, report_key), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(status.as_str())
        .bind(report_key)
        .execute(&self.pool)
        .await?;

        not_found_if_empty(result.rows_affected(), id)
    }

    async fn record_terminal_error(
        &self,
        id: ScanProfileId,
        status: ScanStatus,
        error: &ScanError,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

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
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("UPDATE scan_profiles SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id.0)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
        not_found_if_empty(result.rows_affected(), id)?;

        tx.commit().await?;
        Ok(())
    }

    async fn soft_delete(&self, id: ScanProfileId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE scan_profiles SET deleted = TRUE, updated_at = now() WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        not_found_if_empty(result.rows_affected(), id)
    }
}

fn parse_profile_row(row: PgRow) -> Result<ScanProfile, RepositoryError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<ScanStatus>()
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(ScanProfile {
        id: ScanProfileId(row.try_get("id")?),
        provider_token: row.try_get("provider_token")?,
        name: row.try_get("name")?,
        target_app: row.try_get("target_app")?,
        target_url: row.try_get("target_url")?,
        release_ref: row.try_get("release_id")?,
        status,
        created_at,
        updated_at,
        report_key: row.try_get("report_key")?,
        success_threshold: row.try_get("success_threshold")?,
        deleted: row.try_get("deleted")?,
    })
}
