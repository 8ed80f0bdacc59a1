// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for geotrack-core.
//!
//! One taxonomy covers ingestion and the dashboard read path. The HTTP layer
//! maps each variant to a status code; see `geotrack-server::error`.

use thiserror::Error;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced while handling ingestion and dashboard requests.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The client payload is malformed or incomplete.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the payload.
        message: String,
    },

    /// No device matched the identifier, neither by field nor by storage key.
    #[error("Device '{device_id}' not registered")]
    DeviceNotRegistered {
        /// The identifier that was looked up.
        device_id: String,
    },

    /// The device exists but has no owning company.
    #[error("Device '{device_key}' has no companyId")]
    TenantMisconfigured {
        /// Storage key of the misconfigured device document.
        device_key: String,
    },

    /// A device with this identifier already exists.
    #[error("Device '{device_id}' already registered")]
    DeviceAlreadyRegistered {
        /// The conflicting identifier.
        device_id: String,
    },

    /// A store round-trip failed.
    #[error("Persistence fault during '{operation}': {details}")]
    PersistenceFault {
        /// The operation that failed.
        operation: String,
        /// Driver-level details, for server-side logs only.
        details: String,
    },
}

impl CoreError {
    /// Shorthand for [`CoreError::InvalidRequest`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Shorthand for [`CoreError::PersistenceFault`] with a named operation.
    pub fn persistence(operation: &str, details: impl ToString) -> Self {
        Self::PersistenceFault {
            operation: operation.to_string(),
            details: details.to_string(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::DeviceNotRegistered { .. } => "DEVICE_NOT_REGISTERED",
            Self::TenantMisconfigured { .. } => "TENANT_MISCONFIGURED",
            Self::DeviceAlreadyRegistered { .. } => "DEVICE_ALREADY_REGISTERED",
            Self::PersistenceFault { .. } => "PERSISTENCE_FAULT",
        }
    }

    /// Whether the fault lies with server-side data or infrastructure rather
    /// than with the caller.
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::TenantMisconfigured { .. } | Self::PersistenceFault { .. }
        )
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::PersistenceFault {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::PersistenceFault {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let test_cases = vec![
            (CoreError::invalid("deviceId is required"), "INVALID_REQUEST"),
            (
                CoreError::DeviceNotRegistered {
                    device_id: "T-100".to_string(),
                },
                "DEVICE_NOT_REGISTERED",
            ),
            (
                CoreError::TenantMisconfigured {
                    device_key: "abc123".to_string(),
                },
                "TENANT_MISCONFIGURED",
            ),
            (
                CoreError::DeviceAlreadyRegistered {
                    device_id: "T-100".to_string(),
                },
                "DEVICE_ALREADY_REGISTERED",
            ),
            (
                CoreError::persistence("append_batch", "connection refused"),
                "PERSISTENCE_FAULT",
            ),
        ];

        for (error, expected_code) in test_cases {
            assert_eq!(
                error.error_code(),
                expected_code,
                "Error {:?} should have code {}",
                error,
                expected_code
            );
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid("points must not be empty");
        assert_eq!(err.to_string(), "Invalid request: points must not be empty");

        let err = CoreError::DeviceNotRegistered {
            device_id: "T-100".to_string(),
        };
        assert_eq!(err.to_string(), "Device 'T-100' not registered");

        let err = CoreError::persistence("update_last_position", "timeout");
        assert_eq!(
            err.to_string(),
            "Persistence fault during 'update_last_position': timeout"
        );
    }

    #[test]
    fn test_server_fault_classification() {
        assert!(!CoreError::invalid("x").is_server_fault());
        assert!(
            !CoreError::DeviceNotRegistered {
                device_id: "x".to_string()
            }
            .is_server_fault()
        );
        assert!(
            CoreError::TenantMisconfigured {
                device_key: "x".to_string()
            }
            .is_server_fault()
        );
        assert!(CoreError::persistence("op", "boom").is_server_fault());
    }

    #[test]
    fn test_from_sqlx_error() {
        let err: CoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(
            err,
            CoreError::PersistenceFault { ref operation, .. } if operation == "query"
        ));
    }
}
