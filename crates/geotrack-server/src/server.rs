// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Store bootstrap and the HTTP server loop.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use tokio::net::TcpListener;
use tracing::{info, warn};

use geotrack_core::directory::{DeviceDirectory, PostgresDeviceDirectory, SqliteDeviceDirectory};
use geotrack_core::liveness::FreshnessWindow;
use geotrack_core::migrations;
use geotrack_core::position_log::{PositionLog, PostgresPositionLog, SqlitePositionLog};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

/// A connected, migrated pool for one of the supported backends.
#[derive(Clone)]
pub enum StorePool {
    /// PostgreSQL pool.
    Postgres(PgPool),
    /// SQLite pool.
    Sqlite(SqlitePool),
}

impl StorePool {
    /// Connect to `url` and bring the schema up to date.
    ///
    /// In-memory SQLite databases are private to one connection, so their
    /// pool is capped at a single connection.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)
                .with_context(|| "invalid SQLite URL")?
                .create_if_missing(true);
            let max_connections = if url.contains(":memory:") {
                1
            } else {
                max_connections
            };
            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await
                .context("failed to connect to SQLite")?;
            migrations::run_sqlite(&pool)
                .await
                .context("failed to run SQLite migrations")?;
            Ok(Self::Sqlite(pool))
        } else {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
                .context("failed to connect to PostgreSQL")?;
            migrations::run_postgres(&pool)
                .await
                .context("failed to run PostgreSQL migrations")?;
            Ok(Self::Postgres(pool))
        }
    }

    /// Backend name for logs.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Sqlite(_) => "sqlite",
        }
    }

    /// Tenant directory over this pool.
    pub fn directory(&self) -> Arc<dyn DeviceDirectory> {
        match self {
            Self::Postgres(pool) => Arc::new(PostgresDeviceDirectory::new(pool.clone())),
            Self::Sqlite(pool) => Arc::new(SqliteDeviceDirectory::new(pool.clone())),
        }
    }

    /// Position log over this pool.
    pub fn position_log(&self) -> Arc<dyn PositionLog> {
        match self {
            Self::Postgres(pool) => Arc::new(PostgresPositionLog::new(pool.clone())),
            Self::Sqlite(pool) => Arc::new(SqlitePositionLog::new(pool.clone())),
        }
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        match self {
            Self::Postgres(pool) => pool.close().await,
            Self::Sqlite(pool) => pool.close().await,
        }
    }
}

/// Connected stores: the position log pool and, when configured separately,
/// the directory pool.
pub struct Stores {
    /// Pool backing the position log.
    pub log_pool: StorePool,
    /// Pool backing the tenant directory; `None` when it shares `log_pool`.
    pub directory_pool: Option<StorePool>,
}

impl Stores {
    /// Connect both stores described by `config`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let log_pool = StorePool::connect(&config.database_url, config.max_connections).await?;
        info!(backend = log_pool.backend(), "Position log connected");

        let directory_pool = if config.directory_url == config.database_url {
            None
        } else {
            let pool = StorePool::connect(&config.directory_url, config.max_connections).await?;
            info!(backend = pool.backend(), "Tenant directory connected");
            Some(pool)
        };

        Ok(Self {
            log_pool,
            directory_pool,
        })
    }

    /// Application state over these stores.
    pub fn app_state(&self, config: &Config) -> AppState {
        let directory = self
            .directory_pool
            .as_ref()
            .unwrap_or(&self.log_pool)
            .directory();
        AppState::new(
            directory,
            self.log_pool.position_log(),
            FreshnessWindow::from_secs(config.freshness_window_secs),
            config.max_batch_points,
        )
    }

    /// Close every pool.
    pub async fn close(&self) {
        self.log_pool.close().await;
        if let Some(pool) = &self.directory_pool {
            pool.close().await;
        }
    }
}

/// Connect the stores, serve HTTP until Ctrl+C, then close the pools.
pub async fn run(config: Config) -> Result<()> {
    let stores = Stores::connect(&config).await?;
    let router = build_router(stores.app_state(&config));

    let listener = TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;
    info!(addr = %config.http_addr, "HTTP server ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    stores.close().await;
    info!("Geotrack server shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
    }
}
