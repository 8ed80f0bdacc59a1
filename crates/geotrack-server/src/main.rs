// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Geotrack Server binary.

use tracing::{info, warn};

use geotrack_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "geotrack_server=info,geotrack_core=info,tower_http=info".into()
            }),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        max_connections = config.max_connections,
        freshness_window_secs = config.freshness_window_secs,
        max_batch_points = config.max_batch_points,
        separate_directory = config.directory_url != config.database_url,
        "Starting Geotrack server"
    );

    geotrack_server::server::run(config).await
}
