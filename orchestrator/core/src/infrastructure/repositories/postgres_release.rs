// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Release

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::release::Release;
use crate::domain::repository::{ReleaseRepository, RepositoryError};

pub struct PostgresReleaseRepository {
    pool: PgPool,
}

impl PostgresReleaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReleaseRepository for PostgresReleaseRepository {
    async fn save(&self, release: &Release) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO releases (
                id, app_name, status_id, platform_token, payload, deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                status_id = EXCLUDED.status_id,
                platform_token = EXCLUDED.platform_token,
                payload = EXCLUDED.payload,
                deleted = EXCLUDED.deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&release.id)
        .bind(&release.app_name)
        .bind(&release.status_id)
        .bind(&release.platform_token)
        .bind(&release.payload)
        .bind(release.deleted)
        .bind(release.created_at)
        .bind(release.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save release: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Release>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, app_name, status_id, platform_token, payload, deleted, created_at, updated_at
            FROM releases
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(parse_release_row).transpose()
    }

    async fn soft_delete(&self, id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE releases SET deleted = TRUE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Release {}", id)));
        }
        Ok(())
    }
}

fn parse_release_row(row: PgRow) -> Result<Release, RepositoryError> {
    Ok(Release {
        id: row.try_get("id")?,
        app_name: row.try_get("app_name")?,
        status_id: row.try_get("status_id")?,
        platform_token: row.try_get("platform_token")?,
        payload: row.try_get("payload")?,
        deleted: row.try_get("deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
