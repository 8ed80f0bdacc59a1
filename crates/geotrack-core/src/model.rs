// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain records shared by the stores and handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device document body as stored in the tenant directory.
///
/// Every field is optional: legacy documents predate most of them. Unknown
/// fields such as the old `isActive` flag are ignored when read and left in
/// place by `lastPosition` updates, which patch the stored JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Externally-assigned identifier. Absent on legacy documents, which are
    /// identified by their storage key instead.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Owning tenant.
    #[serde(default)]
    pub company_id: Option<String>,
    /// Display label.
    #[serde(default)]
    pub name: Option<String>,
    /// Denormalized latest sample.
    #[serde(default)]
    pub last_position: Option<LastPosition>,
    /// Reporting hints; informational only.
    #[serde(default)]
    pub config: Option<DeviceConfig>,
    /// When the document was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the document was last written.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The device state cache: the most recent sample seen for a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPosition {
    /// Latitude in degrees.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude in degrees.
    #[serde(default)]
    pub lng: Option<f64>,
    /// Speed as reported by the tracker.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Battery level as reported by the tracker.
    #[serde(default)]
    pub battery: Option<f64>,
    /// Ignition state.
    #[serde(default)]
    pub ignition: Option<bool>,
    /// Event time of the sample.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LastPosition {
    /// State of a freshly registered device that has never reported.
    pub fn unreported() -> Self {
        Self {
            speed: Some(0.0),
            ignition: Some(false),
            ..Self::default()
        }
    }
}

/// Optional reporting-interval hints for a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Expected seconds between reports.
    #[serde(default)]
    pub reporting_interval_secs: Option<u32>,
}

/// A device document together with its storage key.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDocument {
    /// The document store's own key.
    pub key: String,
    /// Document body.
    pub device: Device,
}

impl DeviceDocument {
    /// The identifier devices report with: the `deviceId` field, or the
    /// storage key for legacy documents that lack it.
    pub fn external_id(&self) -> &str {
        self.device.device_id.as_deref().unwrap_or(&self.key)
    }
}

/// One position sample to append to the position log.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    /// Resolved owning tenant.
    pub company_id: String,
    /// External device identifier (never the storage key).
    pub device_id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Raw speed, if reported.
    pub speed: Option<f64>,
    /// Raw battery level, if reported.
    pub battery: Option<f64>,
    /// Raw ignition state, if reported.
    pub ignition: Option<bool>,
    /// Event time.
    pub timestamp: DateTime<Utc>,
}

/// A position log row as read back for history playback.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredPosition {
    /// Database primary key.
    pub id: i64,
    /// Owning tenant.
    pub company_id: String,
    /// External device identifier.
    pub device_id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Raw speed.
    pub speed: Option<f64>,
    /// Raw battery level.
    pub battery: Option<f64>,
    /// Raw ignition state.
    pub ignition: Option<bool>,
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Insert time.
    pub inserted_at: DateTime<Utc>,
}
