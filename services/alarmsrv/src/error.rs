//! Error types for AlarmSrv
//!
//! Component errors stay local; everything that crosses the HTTP or
//! bootstrap boundary is converted into `errors::FieldwatchError`.

use std::time::Duration;

use errors::FieldwatchError;
use fieldwatch_rules::RuleError;
use thiserror::Error;

/// Result type alias for service-level operations
pub type Result<T> = errors::FieldwatchResult<T>;

/// Event recorder failures
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Event store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Event recorder unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt event record: {0}")]
    Corrupt(String),
}

/// Alarm event bus lifecycle failures
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Alarm event bus already started")]
    AlreadyStarted,

    #[error("Alarm event bus consumer did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Recoverable failure while fanning out one event
///
/// Puts the bus consumer into backoff; it does not end the consumer.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to serialize alarm event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),
}

/// Why a reading was skipped without evaluation
///
/// Skips are normal outcomes, not failures: the reading is logged and
/// dropped, and the ingestion transport carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestSkip {
    #[error("{0}")]
    MalformedPath(String),

    #[error("Reading carries no fields")]
    EmptyReading,

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("No conditions for sensor kind: {0}")]
    UnknownSensorKind(String),
}

impl IngestSkip {
    /// Malformed input as opposed to missing reference data
    pub fn is_malformed(&self) -> bool {
        matches!(self, IngestSkip::MalformedPath(_) | IngestSkip::EmptyReading)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            IngestSkip::MalformedPath(_) => "malformed_path",
            IngestSkip::EmptyReading => "empty_reading",
            IngestSkip::UnknownDevice(_) => "unknown_device",
            IngestSkip::UnknownSensorKind(_) => "unknown_sensor_kind",
        }
    }
}

impl From<RuleError> for IngestSkip {
    fn from(err: RuleError) -> Self {
        IngestSkip::MalformedPath(err.to_string())
    }
}

impl From<RecorderError> for FieldwatchError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::Database(e) => FieldwatchError::Sqlite(e),
            RecorderError::Unavailable(msg) => FieldwatchError::ServiceUnavailable(msg),
            RecorderError::Corrupt(msg) => FieldwatchError::Database(msg),
        }
    }
}

impl From<BusError> for FieldwatchError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::AlreadyStarted => FieldwatchError::StartupFailed(err.to_string()),
            BusError::ShutdownTimeout(_) => FieldwatchError::ShutdownError(err.to_string()),
        }
    }
}

impl From<IngestSkip> for FieldwatchError {
    fn from(skip: IngestSkip) -> Self {
        match skip {
            IngestSkip::MalformedPath(msg) => FieldwatchError::MalformedPath(msg),
            IngestSkip::EmptyReading => FieldwatchError::BadRequest(skip.to_string()),
            IngestSkip::UnknownDevice(id) => FieldwatchError::UnknownDevice(id),
            IngestSkip::UnknownSensorKind(kind) => FieldwatchError::UnknownSensorKind(kind),
        }
    }
}
