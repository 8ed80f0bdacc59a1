// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed tenant directory. Document bodies are JSON text.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::error::CoreError;
use crate::model::{Device, DeviceDocument, LastPosition};

use super::{DeviceDirectory, DocumentRow, into_document};

/// SQLite-backed device directory.
#[derive(Clone)]
pub struct SqliteDeviceDirectory {
    pool: SqlitePool,
}

impl SqliteDeviceDirectory {
    /// Create a directory over an existing pool. Migrations must already be applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and run migrations.
    ///
    /// ```ignore
    /// let directory = SqliteDeviceDirectory::from_path(".data/geotrack.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let pool = crate::migrations::open_sqlite(path.as_ref()).await?;
        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DeviceDirectory for SqliteDeviceDirectory {
    async fn find_by_device_id(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceDocument>, CoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT doc_key, data
            FROM device_documents
            WHERE json_extract(data, '$.deviceId') = ?
            ORDER BY doc_key
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("find_by_device_id", e))?;

        Ok(row.map(into_document))
    }

    async fn find_all_by_device_id(
        &self,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<DeviceDocument>, CoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT doc_key, data
            FROM device_documents
            WHERE json_extract(data, '$.deviceId') = ?
            ORDER BY doc_key
            LIMIT ?
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("find_all_by_device_id", e))?;

        Ok(rows.into_iter().map(into_document).collect())
    }

    async fn count_by_device_id(&self, device_id: &str) -> Result<i64, CoreError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM device_documents
            WHERE json_extract(data, '$.deviceId') = ?
            "#,
        )
        .bind(device_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("count_by_device_id", e))?;

        Ok(row.0)
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<DeviceDocument>, CoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT doc_key, data
            FROM device_documents
            WHERE doc_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("get_by_key", e))?;

        Ok(row.map(into_document))
    }

    async fn update_last_position(
        &self,
        key: &str,
        position: &LastPosition,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let position = serde_json::to_string(position)?;
        let result = sqlx::query(
            r#"
            UPDATE device_documents
            SET data = json_set(data, '$.lastPosition', json(?), '$.updatedAt', ?)
            WHERE doc_key = ?
            "#,
        )
        .bind(position)
        .bind(updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("update_last_position", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::persistence(
                "update_last_position",
                format!("device document '{}' disappeared", key),
            ));
        }
        Ok(())
    }

    async fn create_device(&self, key: &str, device: &Device) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO device_documents (doc_key, data)
            VALUES (?, ?)
            ON CONFLICT (doc_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(Json(device))
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("create_device", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::DeviceAlreadyRegistered {
                device_id: key.to_string(),
            });
        }
        Ok(())
    }

    async fn list_by_company(&self, company_id: &str) -> Result<Vec<DeviceDocument>, CoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT doc_key, data
            FROM device_documents
            WHERE json_extract(data, '$.companyId') = ?
            ORDER BY doc_key
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("list_by_company", e))?;

        Ok(rows.into_iter().map(into_document).collect())
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        let row: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::persistence("health_check", e))?;
        Ok(row.0 == 1)
    }
}
