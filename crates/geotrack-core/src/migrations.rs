// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded schema migrations for both stores.
//!
//! The tenant directory (`device_documents`) and the position log
//! (`positions`) share one migration set, so either store can live in its
//! own database or both can share one.
//!
//! ```ignore
//! let pool = PgPool::connect(&database_url).await?;
//! geotrack_core::migrations::run_postgres(&pool).await?;
//! ```

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;

/// PostgreSQL migrator.
pub static POSTGRES: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgresql");

/// SQLite migrator.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Apply pending PostgreSQL migrations. Already-applied ones are skipped.
pub async fn run_postgres(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

/// Apply pending SQLite migrations. Already-applied ones are skipped.
pub async fn run_sqlite(pool: &SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}

/// Open a file-backed SQLite pool, creating the file and its parent
/// directories if needed, and bring the schema up to date.
pub(crate) async fn open_sqlite(path: &Path) -> Result<SqlitePool, CoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CoreError::persistence(
                "create_dir",
                format!("Failed to create directory {:?}: {}", parent, e),
            )
        })?;
    }

    let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .map_err(|e| {
            CoreError::persistence(
                "connect",
                format!("Failed to connect to SQLite at {:?}: {}", path, e),
            )
        })?;

    run_sqlite(&pool)
        .await
        .map_err(|e| CoreError::persistence("migrate", e))?;

    Ok(pool)
}

/// Single-connection in-memory pool with the schema applied.
#[cfg(test)]
pub(crate) async fn test_sqlite_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    run_sqlite(&pool)
        .await
        .expect("Failed to run SQLite migrations");
    pool
}
