// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed position log.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{PositionSample, StoredPosition};

use super::{INSERT_CHUNK_ROWS, PositionLog};

/// SQLite-backed position log.
#[derive(Clone)]
pub struct SqlitePositionLog {
    pool: SqlitePool,
}

impl SqlitePositionLog {
    /// Create a position log over an existing pool. Migrations must already be applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and run migrations.
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
impl PositionLog for SqlitePositionLog {
    async fn append_batch(&self, samples: &[PositionSample]) -> Result<u64, CoreError> {
        if samples.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::persistence("append_batch", e))?;

        let mut written = 0;
        for chunk in samples.chunks(INSERT_CHUNK_ROWS) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                r#"INSERT INTO positions (company_id, device_id, lat, lng, speed, battery, ignition, "timestamp") "#,
            );
            builder.push_values(chunk, |mut row, sample| {
                row.push_bind(&sample.company_id)
                    .push_bind(&sample.device_id)
                    .push_bind(sample.lat)
                    .push_bind(sample.lng)
                    .push_bind(sample.speed)
                    .push_bind(sample.battery)
                    .push_bind(sample.ignition)
                    .push_bind(sample.timestamp);
            });

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| CoreError::persistence("append_batch", e))?;
            written += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| CoreError::persistence("append_batch", e))?;

        debug!(rows = written, "Position batch committed");
        Ok(written)
    }

    async fn query_range(
        &self,
        company_id: &str,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredPosition>, CoreError> {
        sqlx::query_as::<_, StoredPosition>(
            r#"
            SELECT id, company_id, device_id, lat, lng, speed, battery, ignition,
                   "timestamp", inserted_at
            FROM positions
            WHERE company_id = ?
              AND device_id = ?
              AND "timestamp" >= ?
              AND "timestamp" <= ?
            ORDER BY "timestamp" ASC, id ASC
            "#,
        )
        .bind(company_id)
        .bind(device_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("query_range", e))
    }

    async fn count_for_device(
        &self,
        company_id: &str,
        device_id: &str,
    ) -> Result<i64, CoreError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM positions
            WHERE company_id = ? AND device_id = ?
            "#,
        )
        .bind(company_id)
        .bind(device_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("count_for_device", e))?;

        Ok(row.0)
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        let row: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::persistence("health_check", e))?;
        Ok(row.0 == 1)
    }
}
