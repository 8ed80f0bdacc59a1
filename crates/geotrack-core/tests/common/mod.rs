// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for geotrack-core integration tests.
//!
//! SQLite stores run in memory. PostgreSQL tests need TEST_GEOTRACK_DATABASE_URL.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use geotrack_core::directory::{DeviceDirectory, SqliteDeviceDirectory};
use geotrack_core::error::CoreError;
use geotrack_core::migrations;
use geotrack_core::model::{Device, DeviceDocument, LastPosition, PositionSample, StoredPosition};
use geotrack_core::position_log::{PositionLog, SqlitePositionLog};

#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_GEOTRACK_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_GEOTRACK_DATABASE_URL not set");
            return;
        }
    };
}

/// Fixed reference time: 2024-01-01T00:00:00Z.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Single-connection in-memory SQLite pool with migrations applied.
pub async fn sqlite_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    migrations::run_sqlite(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Both stores over one in-memory database.
pub struct TestStores {
    pub pool: SqlitePool,
    pub directory: Arc<SqliteDeviceDirectory>,
    pub log: Arc<SqlitePositionLog>,
}

impl TestStores {
    pub async fn new() -> Self {
        let pool = sqlite_pool().await;
        Self {
            directory: Arc::new(SqliteDeviceDirectory::new(pool.clone())),
            log: Arc::new(SqlitePositionLog::new(pool.clone())),
            pool,
        }
    }

    /// Store a device document under `key` with the given `deviceId` field
    /// and company.
    pub async fn register(&self, key: &str, device_id: Option<&str>, company_id: Option<&str>) {
        let device = Device {
            device_id: device_id.map(str::to_string),
            company_id: company_id.map(str::to_string),
            name: Some(format!("Tracker {}", key)),
            last_position: Some(LastPosition::unreported()),
            ..Device::default()
        };
        self.directory
            .create_device(key, &device)
            .await
            .expect("Failed to register test device");
    }

    pub async fn last_position(&self, key: &str) -> Option<LastPosition> {
        self.directory
            .get_by_key(key)
            .await
            .expect("Lookup failed")
            .expect("Device should exist")
            .device
            .last_position
    }
}

/// Position log whose every call fails.
pub struct FailingPositionLog;

#[async_trait]
impl PositionLog for FailingPositionLog {
    async fn append_batch(&self, _samples: &[PositionSample]) -> Result<u64, CoreError> {
        Err(CoreError::persistence("append_batch", "connection reset by peer"))
    }

    async fn query_range(
        &self,
        _company_id: &str,
        _device_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<StoredPosition>, CoreError> {
        Err(CoreError::persistence("query_range", "connection reset by peer"))
    }

    async fn count_for_device(
        &self,
        _company_id: &str,
        _device_id: &str,
    ) -> Result<i64, CoreError> {
        Err(CoreError::persistence("count_for_device", "connection reset by peer"))
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        Err(CoreError::persistence("health_check", "connection reset by peer"))
    }
}

/// Directory wrapper that counts every call and can refuse updates.
pub struct CountingDirectory<D> {
    pub inner: D,
    pub calls: AtomicUsize,
    pub fail_updates: bool,
}

impl<D> CountingDirectory<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_updates: false,
        }
    }

    pub fn failing_updates(inner: D) -> Self {
        Self {
            fail_updates: true,
            ..Self::new(inner)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<D: DeviceDirectory> DeviceDirectory for CountingDirectory<D> {
    async fn find_by_device_id(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceDocument>, CoreError> {
        self.touch();
        self.inner.find_by_device_id(device_id).await
    }

    async fn find_all_by_device_id(
        &self,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<DeviceDocument>, CoreError> {
        self.touch();
        self.inner.find_all_by_device_id(device_id, limit).await
    }

    async fn count_by_device_id(&self, device_id: &str) -> Result<i64, CoreError> {
        self.touch();
        self.inner.count_by_device_id(device_id).await
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<DeviceDocument>, CoreError> {
        self.touch();
        self.inner.get_by_key(key).await
    }

    async fn update_last_position(
        &self,
        key: &str,
        position: &LastPosition,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.touch();
        if self.fail_updates {
            return Err(CoreError::persistence("update_last_position", "deadline exceeded"));
        }
        self.inner
            .update_last_position(key, position, updated_at)
            .await
    }

    async fn create_device(&self, key: &str, device: &Device) -> Result<(), CoreError> {
        self.touch();
        self.inner.create_device(key, device).await
    }

    async fn list_by_company(&self, company_id: &str) -> Result<Vec<DeviceDocument>, CoreError> {
        self.touch();
        self.inner.list_by_company(company_id).await
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        self.touch();
        self.inner.health_check().await
    }
}
