// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ingestion handler: tenant resolution, position log append, device state update.
//!
//! Each invocation produces exactly one outcome. There are no retries and no
//! cross-store rollback: the log append happens first, then the device
//! update, and a failure in the second step leaves the appended rows in place.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::directory::DeviceDirectory;
use crate::error::{CoreError, Result};
use crate::ingest::IngestionRequest;
use crate::model::DeviceDocument;
use crate::position_log::PositionLog;

/// Default upper bound on points per request.
pub const DEFAULT_MAX_BATCH_POINTS: usize = 1000;

/// Shared state for the ingestion handler.
pub struct IngestHandlerState {
    /// Tenant directory.
    pub directory: Arc<dyn DeviceDirectory>,
    /// Position log.
    pub position_log: Arc<dyn PositionLog>,
    /// Largest accepted batch.
    pub max_batch_points: usize,
}

impl IngestHandlerState {
    /// Create handler state with the default batch limit.
    pub fn new(directory: Arc<dyn DeviceDirectory>, position_log: Arc<dyn PositionLog>) -> Self {
        Self {
            directory,
            position_log,
            max_batch_points: DEFAULT_MAX_BATCH_POINTS,
        }
    }

    /// Override the batch limit.
    pub fn with_max_batch_points(mut self, max_batch_points: usize) -> Self {
        self.max_batch_points = max_batch_points;
        self
    }
}

/// Successful ingestion outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResponse {
    /// Rows appended to the position log.
    pub inserted: u64,
}

/// A device resolved to its owning tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTenant {
    /// The device document that matched.
    pub document: DeviceDocument,
    /// Its owning company.
    pub company_id: String,
}

/// Resolve a reported device identifier to its document and tenant.
///
/// The `deviceId` field lookup always runs first; the storage-key lookup
/// only runs when it finds nothing.
pub async fn resolve_tenant(
    directory: &dyn DeviceDirectory,
    device_id: &str,
) -> Result<ResolvedTenant> {
    let document = match directory.find_by_device_id(device_id).await? {
        Some(document) => document,
        None => legacy_key_lookup(directory, device_id)
            .await?
            .ok_or_else(|| CoreError::DeviceNotRegistered {
                device_id: device_id.to_string(),
            })?,
    };

    let company_id = match document.device.company_id.as_deref().map(str::trim) {
        Some(company_id) if !company_id.is_empty() => company_id.to_string(),
        _ => {
            return Err(CoreError::TenantMisconfigured {
                device_key: document.key.clone(),
            });
        }
    };

    Ok(ResolvedTenant {
        document,
        company_id,
    })
}

/// Compatibility-only: documents created before `deviceId` existed are
/// found by their storage key. Remove once every document carries the field.
async fn legacy_key_lookup(
    directory: &dyn DeviceDirectory,
    device_id: &str,
) -> Result<Option<DeviceDocument>> {
    let document = directory.get_by_key(device_id).await?;
    if let Some(ref doc) = document {
        warn!(
            device_id = %device_id,
            doc_key = %doc.key,
            "Device resolved by storage key; document has no matching deviceId field"
        );
    }
    Ok(document)
}

/// Handle one validated ingestion request.
///
/// # Errors
///
/// - [`CoreError::InvalidRequest`] if the batch is empty or exceeds the
///   configured limit
/// - [`CoreError::DeviceNotRegistered`] if neither lookup finds the device
/// - [`CoreError::TenantMisconfigured`] if the device has no company
/// - [`CoreError::PersistenceFault`] if either store write fails
#[instrument(skip(state, request), fields(device_id = %request.device_id(), points = request.len()))]
pub async fn handle_ingest(
    state: &IngestHandlerState,
    request: IngestionRequest,
) -> Result<IngestResponse> {
    let Some(latest) = request.latest_point() else {
        return Err(CoreError::invalid("points must not be empty"));
    };
    if request.len() > state.max_batch_points {
        return Err(CoreError::invalid(format!(
            "too many points: {} (limit {})",
            request.len(),
            state.max_batch_points
        )));
    }

    // 1. Resolve tenant
    let tenant = resolve_tenant(state.directory.as_ref(), request.device_id()).await?;
    debug!(
        company_id = %tenant.company_id,
        doc_key = %tenant.document.key,
        "Tenant resolved"
    );

    // 2. Append every point to the position log
    let samples = request.to_samples(&tenant.company_id);
    let inserted = state
        .position_log
        .append_batch(&samples)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to append positions"))?;

    // 3. Cache the latest point on the device document
    let last_position = latest.to_last_position();
    state
        .directory
        .update_last_position(&tenant.document.key, &last_position, Utc::now())
        .await
        .inspect_err(|e| {
            error!(
                error = %e,
                inserted,
                "Positions appended but device state update failed"
            )
        })?;

    info!(
        company_id = %tenant.company_id,
        inserted,
        "Positions ingested"
    );

    Ok(IngestResponse { inserted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::SqliteDeviceDirectory;
    use crate::migrations::test_sqlite_pool;
    use crate::model::{Device, LastPosition};
    use crate::position_log::SqlitePositionLog;
    use serde_json::json;

    async fn setup() -> (IngestHandlerState, Arc<SqliteDeviceDirectory>, Arc<SqlitePositionLog>) {
        let pool = test_sqlite_pool().await;
        let directory = Arc::new(SqliteDeviceDirectory::new(pool.clone()));
        let log = Arc::new(SqlitePositionLog::new(pool));
        let state = IngestHandlerState::new(directory.clone(), log.clone());
        (state, directory, log)
    }

    fn registered(device_id: &str, company_id: Option<&str>) -> Device {
        Device {
            device_id: Some(device_id.to_string()),
            company_id: company_id.map(str::to_string),
            name: Some("Truck".to_string()),
            last_position: Some(LastPosition::unreported()),
            ..Device::default()
        }
    }

    fn request(value: serde_json::Value) -> IngestionRequest {
        IngestionRequest::from_value(value).expect("request should validate")
    }

    #[tokio::test]
    async fn test_resolve_prefers_field_over_key() {
        let (_, directory, _) = setup().await;
        // Key "T-100" belongs to another company; field "T-100" belongs to acme.
        directory
            .create_device("T-100", &registered("OTHER", Some("globex")))
            .await
            .unwrap();
        directory
            .create_device("doc-1", &registered("T-100", Some("acme")))
            .await
            .unwrap();

        let tenant = resolve_tenant(directory.as_ref(), "T-100").await.unwrap();
        assert_eq!(tenant.document.key, "doc-1");
        assert_eq!(tenant.company_id, "acme");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_key() {
        let (_, directory, _) = setup().await;
        let legacy = Device {
            company_id: Some("acme".to_string()),
            ..Device::default()
        };
        directory.create_device("legacy-7", &legacy).await.unwrap();

        let tenant = resolve_tenant(directory.as_ref(), "legacy-7").await.unwrap();
        assert_eq!(tenant.document.key, "legacy-7");
        assert_eq!(tenant.company_id, "acme");
    }

    #[tokio::test]
    async fn test_resolve_not_registered() {
        let (_, directory, _) = setup().await;
        let result = resolve_tenant(directory.as_ref(), "ghost").await;
        assert!(matches!(result, Err(CoreError::DeviceNotRegistered { .. })));
    }

    #[tokio::test]
    async fn test_resolve_blank_company_is_misconfigured() {
        let (_, directory, _) = setup().await;
        directory
            .create_device("T-1", &registered("T-1", Some("  ")))
            .await
            .unwrap();
        directory
            .create_device("T-2", &registered("T-2", None))
            .await
            .unwrap();

        for id in ["T-1", "T-2"] {
            let result = resolve_tenant(directory.as_ref(), id).await;
            assert!(
                matches!(
                    result,
                    Err(CoreError::TenantMisconfigured { ref device_key }) if device_key == id
                ),
                "unexpected result for {}: {:?}",
                id,
                result
            );
        }
    }

    #[tokio::test]
    async fn test_batch_limit_checked_before_lookup() {
        let (state, _, _) = setup().await;
        let state = state.with_max_batch_points(2);

        let points: Vec<_> = (0..3)
            .map(|i| json!({"lat": 1.0, "lng": 2.0, "timestamp": 1_704_067_200_000i64 + i}))
            .collect();
        // Device is not registered; the size check must fire first.
        let body = json!({"deviceId": "ghost", "points": points});
        let result = handle_ingest(&state, request(body)).await;

        assert!(matches!(result, Err(CoreError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_ingest_single_point() {
        let (state, directory, log) = setup().await;
        directory
            .create_device("T-100", &registered("T-100", Some("acme")))
            .await
            .unwrap();

        let response = handle_ingest(
            &state,
            request(json!({
                "deviceId": "T-100",
                "lat": 34.05,
                "lng": -118.25,
                "timestamp": "2024-01-01T00:00:00Z"
            })),
        )
        .await
        .unwrap();

        assert_eq!(response, IngestResponse { inserted: 1 });
        assert_eq!(log.count_for_device("acme", "T-100").await.unwrap(), 1);

        let doc = directory.get_by_key("T-100").await.unwrap().unwrap();
        let last = doc.device.last_position.unwrap();
        assert_eq!(last.lat, Some(34.05));
        assert_eq!(last.speed, Some(0.0));
        assert_eq!(last.ignition, Some(false));
        assert_eq!(last.battery, None);
        assert!(doc.device.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_ingest_stamps_external_id_not_key() {
        let (state, directory, log) = setup().await;
        directory
            .create_device("abc123", &registered("XYZ", Some("acme")))
            .await
            .unwrap();

        handle_ingest(
            &state,
            request(json!({
                "deviceId": "XYZ",
                "lat": 1.0,
                "lng": 2.0,
                "timestamp": "2024-01-01T00:00:00Z"
            })),
        )
        .await
        .unwrap();

        assert_eq!(log.count_for_device("acme", "XYZ").await.unwrap(), 1);
        assert_eq!(log.count_for_device("acme", "abc123").await.unwrap(), 0);

        let doc = directory.get_by_key("abc123").await.unwrap().unwrap();
        assert_eq!(doc.device.last_position.unwrap().lat, Some(1.0));
    }
}
