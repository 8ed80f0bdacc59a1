// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP routes.
//!
//! | Route | Method |
//! |-------|--------|
//! | `/ingest` | POST |
//! | `/debug/device?deviceId=` | GET |
//! | `/health` | GET |
//! | `/api/v1/companies/{company_id}/devices` | POST, GET |
//! | `/api/v1/companies/{company_id}/devices/{device_id}/history` | GET |

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use geotrack_core::dashboard_handlers::{
    self, DebugLookupResponse, DeviceHistoryResponse, DeviceSummary, ListDevicesFilter,
    ListDevicesResponse, RegisterDeviceRequest, StatusFilter,
};
use geotrack_core::ingest::{IngestionRequest, parse_timestamp_str};
use geotrack_core::ingest_handlers::{self, IngestResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Build the complete router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest_handler).fallback(method_not_allowed))
        .route("/debug/device", get(debug_device_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/v1/companies/{company_id}/devices",
            post(register_device_handler).get(list_devices_handler),
        )
        .route(
            "/api/v1/companies/{company_id}/devices/{device_id}/history",
            get(device_history_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Ingestion
// =============================================================================

async fn ingest_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<IngestResponse>> {
    let request = IngestionRequest::from_json(&body)?;
    let response = ingest_handlers::handle_ingest(&state.ingest, request).await?;
    Ok(Json(response))
}

async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

// =============================================================================
// Operations
// =============================================================================

#[derive(Debug, Deserialize)]
struct DebugQuery {
    #[serde(rename = "deviceId")]
    device_id: Option<String>,
}

async fn debug_device_handler(
    State(state): State<AppState>,
    Query(query): Query<DebugQuery>,
) -> ApiResult<Json<DebugLookupResponse>> {
    let device_id = query.device_id.unwrap_or_default();
    let response = dashboard_handlers::handle_debug_lookup(&state.dashboard, &device_id).await?;
    Ok(Json(response))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = dashboard_handlers::handle_health_check(&state.dashboard).await;
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

// =============================================================================
// Dashboard
// =============================================================================

async fn register_device_handler(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<DeviceSummary>)> {
    let mut request: RegisterDeviceRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("body is not a valid device: {}", e)))?;
    request.company_id = company_id;

    let summary = dashboard_handlers::handle_register_device(&state.dashboard, request).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[derive(Debug, Deserialize)]
struct ListDevicesQuery {
    status: Option<String>,
    search: Option<String>,
}

async fn list_devices_handler(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Query(query): Query<ListDevicesQuery>,
) -> ApiResult<Json<ListDevicesResponse>> {
    let status = match query.status.as_deref() {
        Some(raw) => raw.parse::<StatusFilter>()?,
        None => StatusFilter::All,
    };
    let filter = ListDevicesFilter {
        status,
        search: query.search,
    };

    let response =
        dashboard_handlers::handle_list_devices(&state.dashboard, &company_id, filter).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    start: Option<String>,
    end: Option<String>,
}

fn required_time(value: Option<&str>, name: &str) -> ApiResult<DateTime<Utc>> {
    let raw = value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} is required", name)))?;
    parse_timestamp_str(raw)
        .ok_or_else(|| ApiError::bad_request(format!("{} is not a valid date/time", name)))
}

async fn device_history_handler(
    State(state): State<AppState>,
    Path((company_id, device_id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<DeviceHistoryResponse>> {
    let start = required_time(query.start.as_deref(), "start")?;
    let end = required_time(query.end.as_deref(), "end")?;

    let response = dashboard_handlers::handle_device_history(
        &state.dashboard,
        &company_id,
        &device_id,
        start,
        end,
    )
    .await?;
    Ok(Json(response))
}
