//! Unified error handling for Fieldwatch services
//!
//! Library crates keep their own narrow `thiserror` enums; services convert
//! them into [`FieldwatchError`] at the API and bootstrap boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ErrorInfo - API error response type
// ============================================================================

/// Standard error body for API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// HTTP status
    pub code: u16,
    /// Stable machine-readable identifier, e.g. `OVERLAPPING_RANGES`
    pub error_code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ============================================================================
// FieldwatchError - Main error type
// ============================================================================

/// Main error type for all Fieldwatch services
#[derive(Debug, Error)]
pub enum FieldwatchError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Database Errors
    // ======================================
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    // ======================================
    // Ingestion & Rule Errors
    // ======================================
    #[error("Malformed ingestion path: {0}")]
    MalformedPath(String),

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("Overlapping condition ranges: {0}")]
    OverlappingRanges(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Unknown sensor kind: {0}")]
    UnknownSensorKind(String),

    // ======================================
    // API Errors
    // ======================================
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Service startup failed: {0}")]
    StartupFailed(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

/// Result type alias using FieldwatchError
pub type FieldwatchResult<T> = Result<T, FieldwatchError>;

/// Coarse error classification, drives the log level of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Configuration,
    Database,
    Network,
    Validation,
    NotFound,
    Conflict,
    RuleEngine,
    Internal,
}

impl FieldwatchError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::MalformedPath(_) | Self::InvalidCondition(_) => 400,

            Self::NotFound { .. } | Self::UnknownDevice(_) | Self::UnknownSensorKind(_) => 404,

            Self::OverlappingRanges(_) => 409,

            Self::ServiceUnavailable(_) | Self::StartupFailed(_) => 503,

            Self::Configuration(_)
            | Self::InvalidConfig { .. }
            | Self::Database(_)
            | Self::Sqlite(_)
            | Self::ShutdownError(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::MalformedPath(_) => "MALFORMED_PATH",
            Self::InvalidCondition(_) => "INVALID_CONDITION",
            Self::OverlappingRanges(_) => "OVERLAPPING_RANGES",
            Self::UnknownDevice(_) => "UNKNOWN_DEVICE",
            Self::UnknownSensorKind(_) => "UNKNOWN_SENSOR_KIND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::StartupFailed(_) => "STARTUP_FAILED",
            Self::ShutdownError(_) => "SHUTDOWN_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } => ErrorCategory::Configuration,
            Self::Database(_) | Self::Sqlite(_) => ErrorCategory::Database,
            Self::MalformedPath(_) | Self::InvalidCondition(_) => ErrorCategory::RuleEngine,
            Self::OverlappingRanges(_) => ErrorCategory::Conflict,
            Self::UnknownDevice(_) | Self::UnknownSensorKind(_) | Self::NotFound { .. } => {
                ErrorCategory::NotFound
            },
            Self::BadRequest(_) => ErrorCategory::Validation,
            Self::ServiceUnavailable(_) => ErrorCategory::Network,
            Self::StartupFailed(_) | Self::ShutdownError(_) => ErrorCategory::Internal,
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Database => Level::ERROR,
            ErrorCategory::Network | ErrorCategory::Configuration => Level::WARN,
            _ => Level::INFO,
        }
    }

    /// Convert to API ErrorInfo for HTTP responses
    pub fn to_error_info(&self) -> ErrorInfo {
        let details = match self {
            Self::InvalidConfig { field, .. } => Some(format!("field: {}", field)),
            Self::OverlappingRanges(msg) | Self::InvalidCondition(msg) => Some(msg.clone()),
            _ => None,
        };
        ErrorInfo {
            code: self.status_code(),
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

#[cfg(feature = "axum-support")]
impl axum::response::IntoResponse for FieldwatchError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::response::Json;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.log_level() {
            tracing::Level::ERROR => tracing::error!("API error: {}", self),
            tracing::Level::WARN => tracing::warn!("API error: {}", self),
            _ => tracing::debug!("API error: {}", self),
        }
        (status, Json(self.to_error_info())).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FieldwatchError::MalformedPath("a/b".into()).status_code(), 400);
        assert_eq!(FieldwatchError::UnknownDevice("d1".into()).status_code(), 404);
        assert_eq!(
            FieldwatchError::OverlappingRanges("temp".into()).status_code(),
            409
        );
        assert_eq!(FieldwatchError::ShutdownError("bus".into()).status_code(), 500);
    }

    #[test]
    fn test_error_info_body() {
        let info = FieldwatchError::OverlappingRanges("conditions 1 and 2".into()).to_error_info();
        assert_eq!(info.code, 409);
        assert_eq!(info.error_code, "OVERLAPPING_RANGES");
        assert_eq!(info.details.as_deref(), Some("conditions 1 and 2"));

        let json = serde_json::to_value(FieldwatchError::UnknownSensorKind("TH".into()).to_error_info())
            .unwrap();
        assert_eq!(json["error_code"], "UNKNOWN_SENSOR_KIND");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_category_and_log_level() {
        let err = FieldwatchError::UnknownSensorKind("TH".into());
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.log_level(), tracing::Level::INFO);
        assert_eq!(
            FieldwatchError::ServiceUnavailable("recorder".into()).log_level(),
            tracing::Level::WARN
        );
        assert_eq!(
            FieldwatchError::Database("corrupt row".into()).log_level(),
            tracing::Level::ERROR
        );
    }
}
