// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;

use geotrack_core::ingest_handlers::DEFAULT_MAX_BATCH_POINTS;
use geotrack_core::liveness::DEFAULT_FRESHNESS_WINDOW_SECS;

/// Geotrack server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Position log connection URL (PostgreSQL or SQLite)
    pub database_url: String,
    /// Tenant directory connection URL (PostgreSQL or SQLite)
    pub directory_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Pool size per store
    pub max_connections: u32,
    /// Liveness window in seconds
    pub freshness_window_secs: u64,
    /// Largest accepted ingestion batch
    pub max_batch_points: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `GEOTRACK_DATABASE_URL`: position log database
    ///
    /// Optional (with defaults):
    /// - `GEOTRACK_DIRECTORY_URL`: device directory database (default: the position log database)
    /// - `GEOTRACK_HTTP_PORT`: HTTP port (default: 8080)
    /// - `GEOTRACK_MAX_CONNECTIONS`: pool size per store (default: 10)
    /// - `GEOTRACK_FRESHNESS_WINDOW_SECS`: liveness window (default: 300)
    /// - `GEOTRACK_MAX_BATCH_POINTS`: largest accepted batch (default: 1000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("GEOTRACK_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("GEOTRACK_DATABASE_URL"))?;
        check_url("GEOTRACK_DATABASE_URL", &database_url)?;

        let directory_url = match std::env::var("GEOTRACK_DIRECTORY_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => database_url.clone(),
        };
        check_url("GEOTRACK_DIRECTORY_URL", &directory_url)?;

        let http_port: u16 = std::env::var("GEOTRACK_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("GEOTRACK_HTTP_PORT", "must be a valid port number")
            })?;

        let max_connections: u32 = std::env::var("GEOTRACK_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "GEOTRACK_MAX_CONNECTIONS",
                "must be a positive integer",
            ))?;

        let freshness_window_secs: u64 = match std::env::var("GEOTRACK_FRESHNESS_WINDOW_SECS") {
            Ok(v) => v.parse().map_err(|_| {
                ConfigError::Invalid(
                    "GEOTRACK_FRESHNESS_WINDOW_SECS",
                    "must be a non-negative integer",
                )
            })?,
            Err(_) => DEFAULT_FRESHNESS_WINDOW_SECS,
        };

        let max_batch_points: usize = match std::env::var("GEOTRACK_MAX_BATCH_POINTS") {
            Ok(v) => v.parse().ok().filter(|n| *n > 0).ok_or(ConfigError::Invalid(
                "GEOTRACK_MAX_BATCH_POINTS",
                "must be a positive integer",
            ))?,
            Err(_) => DEFAULT_MAX_BATCH_POINTS,
        };

        Ok(Self {
            database_url,
            directory_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            max_connections,
            freshness_window_secs,
            max_batch_points,
        })
    }
}

fn check_url(var: &'static str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("postgres://")
        || url.starts_with("postgresql://")
        || url.starts_with("sqlite:")
    {
        Ok(())
    } else {
        Err(ConfigError::Invalid(
            var,
            "must start with postgres://, postgresql:// or sqlite:",
        ))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
