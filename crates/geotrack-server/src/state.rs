// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application state shared by every route.

use std::sync::Arc;

use geotrack_core::dashboard_handlers::DashboardHandlerState;
use geotrack_core::directory::DeviceDirectory;
use geotrack_core::ingest_handlers::IngestHandlerState;
use geotrack_core::liveness::FreshnessWindow;
use geotrack_core::position_log::PositionLog;

/// Handler states for the ingestion and dashboard routes. Both share the
/// same store handles.
#[derive(Clone)]
pub struct AppState {
    /// Ingestion handler state.
    pub ingest: Arc<IngestHandlerState>,
    /// Dashboard handler state.
    pub dashboard: Arc<DashboardHandlerState>,
}

impl AppState {
    /// Build state over the two stores.
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        position_log: Arc<dyn PositionLog>,
        freshness: FreshnessWindow,
        max_batch_points: usize,
    ) -> Self {
        let ingest = IngestHandlerState::new(directory.clone(), position_log.clone())
            .with_max_batch_points(max_batch_points);
        let dashboard =
            DashboardHandlerState::new(directory, position_log).with_freshness(freshness);
        Self {
            ingest: Arc::new(ingest),
            dashboard: Arc::new(dashboard),
        }
    }
}
