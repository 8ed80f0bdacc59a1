// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Position log: the append-only `positions` table.
//!
//! Rows are never updated or deleted. Re-submitting a sample appends a
//! duplicate; nothing deduplicates on `(device_id, timestamp)`.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPositionLog;
pub use self::sqlite::SqlitePositionLog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{PositionSample, StoredPosition};

/// Rows per multi-row INSERT statement. Eight binds per row keeps every
/// statement well under both backends' bind-parameter limits.
pub const INSERT_CHUNK_ROWS: usize = 500;

/// Append/read contract against the relational position store.
#[async_trait]
pub trait PositionLog: Send + Sync {
    /// Append all samples in one transaction on one pooled connection.
    ///
    /// The connection goes back to the pool on every path: commit, error,
    /// or the future being dropped. Returns the number of rows written.
    async fn append_batch(&self, samples: &[PositionSample]) -> Result<u64, CoreError>;

    /// Samples for one device of one tenant with `start <= timestamp <= end`,
    /// oldest first.
    async fn query_range(
        &self,
        company_id: &str,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredPosition>, CoreError>;

    /// Total rows stored for one device of one tenant.
    async fn count_for_device(&self, company_id: &str, device_id: &str)
    -> Result<i64, CoreError>;

    /// Round-trip to the store.
    async fn health_check(&self) -> Result<bool, CoreError>;
}
