// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! API error types.
//!
//! Maps core errors onto the HTTP contract trackers and the dashboard rely on.
//! Server-side faults are logged in full here and answered generically.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use geotrack_core::CoreError;

/// Body for 404 on ingestion.
pub const DEVICE_NOT_REGISTERED: &str = "Device not registered";

/// Body for a device without an owning company.
pub const TENANT_MISCONFIGURED: &str = "Configuration error: device has no company assigned";

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request parameters outside the core payload, such as query strings
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Error raised by a core handler
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Short diagnostic on unexpected faults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Core(err) => match err {
                CoreError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
                CoreError::DeviceNotRegistered { .. } => StatusCode::NOT_FOUND,
                CoreError::DeviceAlreadyRegistered { .. } => StatusCode::CONFLICT,
                CoreError::TenantMisconfigured { .. } | CoreError::PersistenceFault { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Core(err) => err.error_code(),
        }
    }

    /// The body sent to the client. Never carries driver text.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::BadRequest(msg) => ErrorBody {
                error: msg.clone(),
                details: None,
            },
            Self::Core(err) => match err {
                CoreError::InvalidRequest { message } => ErrorBody {
                    error: message.clone(),
                    details: None,
                },
                CoreError::DeviceNotRegistered { .. } => ErrorBody {
                    error: DEVICE_NOT_REGISTERED.to_string(),
                    details: None,
                },
                CoreError::TenantMisconfigured { .. } => ErrorBody {
                    error: TENANT_MISCONFIGURED.to_string(),
                    details: None,
                },
                CoreError::DeviceAlreadyRegistered { device_id } => ErrorBody {
                    error: format!("Device '{}' already registered", device_id),
                    details: None,
                },
                CoreError::PersistenceFault { operation, .. } => ErrorBody {
                    error: "Internal server error".to_string(),
                    details: Some(operation.clone()),
                },
                _ => ErrorBody {
                    error: "Internal server error".to_string(),
                    details: Some(err.error_code().to_string()),
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
