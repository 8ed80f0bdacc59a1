// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Geotrack Server - HTTP front end for position ingestion
//!
//! Wraps the handlers in `geotrack-core` in an axum router and maps their
//! errors onto HTTP status codes.
//!
//! # Ingestion responses
//!
//! | Condition | Status | Body |
//! |-----------|--------|------|
//! | Wrong method | 405 | plain text |
//! | Invalid payload | 400 | `{"error": ...}` |
//! | Unknown device | 404 | `{"error": "Device not registered"}` |
//! | Device without company | 500 | `{"error": "Configuration error: device has no company assigned"}` |
//! | Success | 200 | `{"inserted": n}` |
//! | Store fault | 500 | `{"error": ..., "details": ...}` |
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `GEOTRACK_DATABASE_URL` | Yes | - | Position log database |
//! | `GEOTRACK_DIRECTORY_URL` | No | database URL | Tenant directory database |
//! | `GEOTRACK_HTTP_PORT` | No | `8080` | HTTP port |
//! | `GEOTRACK_MAX_CONNECTIONS` | No | `10` | Pool size per store |
//! | `GEOTRACK_FRESHNESS_WINDOW_SECS` | No | `300` | Liveness window |
//! | `GEOTRACK_MAX_BATCH_POINTS` | No | `1000` | Largest accepted batch |

#![deny(missing_docs)]

/// Server configuration loaded from environment variables.
pub mod config;

/// HTTP error mapping.
pub mod error;

/// Router and route handlers.
pub mod routes;

/// Store bootstrap and server loop.
pub mod server;

/// Shared application state.
pub mod state;
