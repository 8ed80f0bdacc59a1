// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenant directory: device documents and their cached last position.
//!
//! Documents live in a `device_documents` table as `(doc_key, data)` pairs,
//! where `data` is the JSON body of a [`Device`]. Field lookups match on the
//! `deviceId` inside the body; key lookups match on `doc_key`.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresDeviceDirectory;
pub use self::sqlite::SqliteDeviceDirectory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{Device, DeviceDocument, LastPosition};

/// Read/write contract against the device document store.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Find at most one device whose `deviceId` field equals `device_id`.
    async fn find_by_device_id(&self, device_id: &str)
    -> Result<Option<DeviceDocument>, CoreError>;

    /// Find every device whose `deviceId` field equals `device_id`, up to
    /// `limit`. Duplicates are a data problem the debug endpoint surfaces.
    async fn find_all_by_device_id(
        &self,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<DeviceDocument>, CoreError>;

    /// Number of devices whose `deviceId` field equals `device_id`.
    async fn count_by_device_id(&self, device_id: &str) -> Result<i64, CoreError>;

    /// Fetch the device stored under `key`.
    async fn get_by_key(&self, key: &str) -> Result<Option<DeviceDocument>, CoreError>;

    /// Overwrite `lastPosition` and `updatedAt` on the device stored under
    /// `key`. Fails if the document no longer exists.
    async fn update_last_position(
        &self,
        key: &str,
        position: &LastPosition,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Store a new device under `key`. Fails with
    /// [`CoreError::DeviceAlreadyRegistered`] if the key is taken.
    async fn create_device(&self, key: &str, device: &Device) -> Result<(), CoreError>;

    /// All devices owned by `company_id`.
    async fn list_by_company(&self, company_id: &str) -> Result<Vec<DeviceDocument>, CoreError>;

    /// Round-trip to the store.
    async fn health_check(&self) -> Result<bool, CoreError>;
}

/// Raw `(doc_key, data)` row shared by both backends.
pub(crate) type DocumentRow = (String, sqlx::types::Json<Device>);

pub(crate) fn into_document((key, data): DocumentRow) -> DeviceDocument {
    DeviceDocument {
        key,
        device: data.0,
    }
}
