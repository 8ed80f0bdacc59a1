// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dashboard handlers for geotrack-core.
//!
//! These handlers serve the fleet dashboard and operators:
//! - Device registration
//! - Device listing with derived online/offline status
//! - Position history playback
//! - Debug lookup of a device identifier
//! - Health check

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::directory::DeviceDirectory;
use crate::error::{CoreError, Result};
use crate::liveness::{DeviceStatus, FreshnessWindow};
use crate::model::{Device, DeviceConfig, DeviceDocument, LastPosition, StoredPosition};
use crate::position_log::PositionLog;

/// Most matches the debug lookup reports.
pub const DEBUG_MATCH_LIMIT: i64 = 10;

/// Shared state for dashboard handlers.
pub struct DashboardHandlerState {
    /// Tenant directory.
    pub directory: Arc<dyn DeviceDirectory>,
    /// Position log.
    pub position_log: Arc<dyn PositionLog>,
    /// Liveness window.
    pub freshness: FreshnessWindow,
    /// When the server started (for uptime calculation).
    pub start_time: Instant,
    /// Server version string.
    pub version: String,
}

impl DashboardHandlerState {
    /// Create dashboard state with the default freshness window.
    pub fn new(directory: Arc<dyn DeviceDirectory>, position_log: Arc<dyn PositionLog>) -> Self {
        Self {
            directory,
            position_log,
            freshness: FreshnessWindow::default(),
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the liveness window.
    pub fn with_freshness(mut self, freshness: FreshnessWindow) -> Self {
        self.freshness = freshness;
        self
    }

    /// Server uptime in milliseconds.
    pub fn uptime_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }
}

// ============================================================================
// Request / response types
// ============================================================================

/// Registration payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    /// External identifier the tracker will report with.
    #[serde(default)]
    pub device_id: String,
    /// Display label.
    #[serde(default)]
    pub name: String,
    /// Owning tenant.
    #[serde(default)]
    pub company_id: String,
    /// Optional reporting hints.
    #[serde(default)]
    pub config: Option<DeviceConfig>,
}

/// Which devices a listing includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Every device.
    #[default]
    All,
    /// Only devices reporting within the freshness window.
    Online,
    /// Only devices outside it.
    Offline,
}

impl std::str::FromStr for StatusFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(CoreError::invalid(format!(
                "status must be one of all, online, offline (got '{}')",
                other
            ))),
        }
    }
}

impl StatusFilter {
    fn admits(self, status: DeviceStatus) -> bool {
        match self {
            Self::All => true,
            Self::Online => status == DeviceStatus::Online,
            Self::Offline => status == DeviceStatus::Offline,
        }
    }
}

/// Listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDevicesFilter {
    /// Status filter.
    #[serde(default)]
    pub status: StatusFilter,
    /// Case-insensitive substring matched against external id or name.
    #[serde(default)]
    pub search: Option<String>,
}

/// A device as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// External identifier.
    pub device_id: String,
    /// Display label.
    pub name: Option<String>,
    /// Owning tenant.
    pub company_id: Option<String>,
    /// Derived liveness.
    pub status: DeviceStatus,
    /// Cached latest sample.
    pub last_position: Option<LastPosition>,
    /// Reporting hints.
    pub config: Option<DeviceConfig>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last write time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceSummary {
    fn from_document(doc: DeviceDocument, freshness: &FreshnessWindow, now: DateTime<Utc>) -> Self {
        let status = freshness.status_of(doc.device.last_position.as_ref(), now);
        let device_id = doc.external_id().to_string();
        let Device {
            name,
            company_id,
            last_position,
            config,
            created_at,
            updated_at,
            ..
        } = doc.device;
        Self {
            device_id,
            name,
            company_id,
            status,
            last_position,
            config,
            created_at,
            updated_at,
        }
    }
}

/// Device listing.
#[derive(Debug, Clone, Serialize)]
pub struct ListDevicesResponse {
    /// Matching devices, sorted by name then id.
    pub devices: Vec<DeviceSummary>,
    /// Number of matching devices.
    pub total: usize,
}

/// Position history for one device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHistoryResponse {
    /// External identifier.
    pub device_id: String,
    /// Inclusive range start.
    pub start: DateTime<Utc>,
    /// Inclusive range end.
    pub end: DateTime<Utc>,
    /// Samples, oldest first.
    pub positions: Vec<StoredPosition>,
}

/// Debug lookup result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugLookupResponse {
    /// Documents whose `deviceId` field matched.
    pub match_count: i64,
    /// Storage keys of the first [`DEBUG_MATCH_LIMIT`] matches.
    pub keys: Vec<String>,
    /// Sanitized view of the first match.
    pub device: Option<DebugDeviceView>,
}

/// The fields of a device document safe to show in debug output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugDeviceView {
    /// `deviceId` field as stored.
    pub device_id: Option<String>,
    /// Display label.
    pub name: Option<String>,
    /// Owning tenant.
    pub company_id: Option<String>,
    /// Cached latest sample.
    pub last_position: Option<LastPosition>,
}

/// Health of the service and both stores.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    /// Both stores answered.
    pub healthy: bool,
    /// Tenant directory answered.
    pub directory_healthy: bool,
    /// Position log answered.
    pub position_log_healthy: bool,
    /// Server version.
    pub version: String,
    /// Uptime in milliseconds.
    pub uptime_ms: i64,
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Registration
// ============================================================================

/// Register a new device.
///
/// The document is keyed by the device id, carries it in `deviceId` too, and
/// starts with an unreported `lastPosition`.
///
/// # Errors
///
/// - [`CoreError::InvalidRequest`] if any of the three identifiers is blank
/// - [`CoreError::DeviceAlreadyRegistered`] if the id is taken as a key or a field
#[instrument(skip(state, request), fields(device_id = %request.device_id, company_id = %request.company_id))]
pub async fn handle_register_device(
    state: &DashboardHandlerState,
    request: RegisterDeviceRequest,
) -> Result<DeviceSummary> {
    let device_id = required(&request.device_id, "deviceId")?;
    let name = required(&request.name, "name")?;
    let company_id = required(&request.company_id, "companyId")?;

    let taken_as_key = state.directory.get_by_key(&device_id).await?.is_some();
    let taken_as_field = state.directory.find_by_device_id(&device_id).await?.is_some();
    if taken_as_key || taken_as_field {
        return Err(CoreError::DeviceAlreadyRegistered { device_id });
    }

    let now = Utc::now();
    let device = Device {
        device_id: Some(device_id.clone()),
        company_id: Some(company_id),
        name: Some(name),
        last_position: Some(LastPosition::unreported()),
        config: request.config,
        created_at: Some(now),
        updated_at: Some(now),
    };

    // Still fails on a concurrent registration of the same key.
    state.directory.create_device(&device_id, &device).await?;
    info!("Device registered");

    let doc = DeviceDocument {
        key: device_id,
        device,
    };
    Ok(DeviceSummary::from_document(doc, &state.freshness, now))
}

// ============================================================================
// Listing
// ============================================================================

/// List a tenant's devices with their derived status.
#[instrument(skip(state, filter), fields(status = ?filter.status))]
pub async fn handle_list_devices(
    state: &DashboardHandlerState,
    company_id: &str,
    filter: ListDevicesFilter,
) -> Result<ListDevicesResponse> {
    let company_id = required(company_id, "companyId")?;
    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let now = Utc::now();
    let mut devices: Vec<DeviceSummary> = state
        .directory
        .list_by_company(&company_id)
        .await?
        .into_iter()
        .map(|doc| DeviceSummary::from_document(doc, &state.freshness, now))
        .filter(|summary| filter.status.admits(summary.status))
        .filter(|summary| match &needle {
            Some(needle) => {
                summary.device_id.to_lowercase().contains(needle)
                    || summary
                        .name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(needle))
            }
            None => true,
        })
        .collect();

    devices.sort_by(|a, b| {
        a.name
            .as_deref()
            .unwrap_or("")
            .cmp(b.name.as_deref().unwrap_or(""))
            .then_with(|| a.device_id.cmp(&b.device_id))
    });

    debug!(count = devices.len(), "Devices listed");
    let total = devices.len();
    Ok(ListDevicesResponse { devices, total })
}

// ============================================================================
// History
// ============================================================================

/// Position samples for one device over an inclusive time range.
///
/// # Errors
///
/// Returns [`CoreError::InvalidRequest`] if an identifier is blank or
/// `start` is after `end`.
#[instrument(skip(state))]
pub async fn handle_device_history(
    state: &DashboardHandlerState,
    company_id: &str,
    device_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<DeviceHistoryResponse> {
    let company_id = required(company_id, "companyId")?;
    let device_id = required(device_id, "deviceId")?;
    if start > end {
        return Err(CoreError::invalid("start must not be after end"));
    }

    let positions = state
        .position_log
        .query_range(&company_id, &device_id, start, end)
        .await?;
    debug!(count = positions.len(), "History loaded");

    Ok(DeviceHistoryResponse {
        device_id,
        start,
        end,
        positions,
    })
}

// ============================================================================
// Debug lookup
// ============================================================================

/// Report which documents carry a given `deviceId` field.
#[instrument(skip(state))]
pub async fn handle_debug_lookup(
    state: &DashboardHandlerState,
    device_id: &str,
) -> Result<DebugLookupResponse> {
    let device_id = required(device_id, "deviceId")?;

    let matches = state
        .directory
        .find_all_by_device_id(&device_id, DEBUG_MATCH_LIMIT)
        .await?;

    let match_count = state.directory.count_by_device_id(&device_id).await?;

    let keys: Vec<String> = matches.iter().map(|doc| doc.key.clone()).collect();
    let device = matches.into_iter().next().map(|doc| DebugDeviceView {
        device_id: doc.device.device_id,
        name: doc.device.name,
        company_id: doc.device.company_id,
        last_position: doc.device.last_position,
    });

    Ok(DebugLookupResponse {
        match_count,
        keys,
        device,
    })
}

// ============================================================================
// Health Check
// ============================================================================

/// Ping both stores and report server metadata.
#[instrument(skip(state))]
pub async fn handle_health_check(state: &DashboardHandlerState) -> HealthCheckResponse {
    debug!("Health check requested");

    let directory_healthy = state.directory.health_check().await.unwrap_or(false);
    let position_log_healthy = state.position_log.health_check().await.unwrap_or(false);

    HealthCheckResponse {
        healthy: directory_healthy && position_log_healthy,
        directory_healthy,
        position_log_healthy,
        version: state.version.clone(),
        uptime_ms: state.uptime_ms(),
    }
}
