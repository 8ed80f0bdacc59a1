// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Device liveness, derived from the recency of the last reported sample.
//!
//! There is exactly one rule: a device is online when its cached
//! `lastPosition.timestamp` is no older than the freshness window. The
//! legacy `isActive` flag on old documents is never consulted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::LastPosition;

/// Default freshness window in seconds.
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 300;

/// Derived online/offline state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Reported within the freshness window.
    Online,
    /// Never reported, or last reported before the window.
    Offline,
}

/// How recent a sample must be for its device to count as online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow(chrono::Duration);

impl FreshnessWindow {
    /// Window spanning `secs` seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self::from_duration(Duration::from_secs(secs))
    }

    /// Window spanning `duration`, saturating at chrono's maximum.
    pub fn from_duration(duration: Duration) -> Self {
        Self(chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX))
    }

    /// Window length.
    pub fn as_duration(&self) -> chrono::Duration {
        self.0
    }

    /// Status of a device whose last sample was taken at `last_seen`.
    /// Samples dated in the future count as online.
    pub fn status_at(&self, last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DeviceStatus {
        match last_seen {
            Some(ts) if now.signed_duration_since(ts) <= self.0 => DeviceStatus::Online,
            _ => DeviceStatus::Offline,
        }
    }

    /// Status derived from a cached last position.
    pub fn status_of(&self, position: Option<&LastPosition>, now: DateTime<Utc>) -> DeviceStatus {
        self.status_at(position.and_then(|p| p.timestamp), now)
    }
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self::from_secs(DEFAULT_FRESHNESS_WINDOW_SECS)
    }
}
