// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Geotrack Core - GPS Position Ingestion
//!
//! This crate turns tracker submissions into durable position history and an
//! up-to-date "last known position" per device, scoped to the owning tenant.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      GPS trackers / gateways                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ POST /ingest
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         geotrack-server                                  │
//! │                 (HTTP routing, status code mapping)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     geotrack-core (This Crate)                           │
//! │   IngestionRequest → resolve_tenant → append_batch → update_last_position│
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │   Tenant directory    │                    │       Position log          │
//! │  (device_documents)   │                    │       (positions)           │
//! └───────────────────────┘                    └─────────────────────────────┘
//! ```
//!
//! # Ingestion
//!
//! 1. The body is validated into an [`ingest::IngestionRequest`]. Invalid
//!    payloads never touch a store.
//! 2. The reported `deviceId` is resolved to a device document and its
//!    `companyId` (field lookup first, storage-key lookup as a fallback).
//! 3. Every point is appended to the position log in one transaction.
//! 4. The latest point is written to the device's `lastPosition`.
//!
//! The two stores are not updated atomically. A failure after step 3 leaves
//! the appended rows in place and the device state stale.
//!
//! # Backends
//!
//! | Store | PostgreSQL | SQLite |
//! |-------|------------|--------|
//! | Tenant directory | [`directory::PostgresDeviceDirectory`] | [`directory::SqliteDeviceDirectory`] |
//! | Position log | [`position_log::PostgresPositionLog`] | [`position_log::SqlitePositionLog`] |
//!
//! # Modules
//!
//! - [`model`]: Device documents and position records
//! - [`ingest`]: Request schema and validation
//! - [`directory`]: Tenant directory trait and backends
//! - [`position_log`]: Position log trait and backends
//! - [`liveness`]: Online/offline derivation
//! - [`ingest_handlers`]: The ingestion handler
//! - [`dashboard_handlers`]: Registration, listing, history, debug and health
//! - [`error`]: Error taxonomy
//! - [`migrations`]: Embedded schema migrations

#![deny(missing_docs)]

/// Dashboard handlers (registration, listing, history, debug lookup, health).
pub mod dashboard_handlers;

/// Tenant directory: device documents keyed by storage key.
pub mod directory;

/// Error types for ingestion and dashboard operations.
pub mod error;

/// Ingestion request schema and validation.
pub mod ingest;

/// The ingestion handler.
pub mod ingest_handlers;

/// Online/offline derivation from sample recency.
pub mod liveness;

/// Embedded database migrations.
pub mod migrations;

/// Domain records.
pub mod model;

/// Append-only position log.
pub mod position_log;

pub use error::CoreError;
