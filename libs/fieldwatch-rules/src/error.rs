//! Rule Engine Error Types

use errors::FieldwatchError;
use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Rule engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    /// Ingestion path could not be split into device and sensor kind
    #[error("Malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    /// Condition violates its own invariants
    #[error("Invalid condition {id}: {reason}")]
    InvalidCondition { id: i64, reason: String },

    /// Two conditions of one sensor kind fire on overlapping numeric ranges
    #[error("Conditions {first} and {second} of sensor kind '{sensor_kind}' overlap on field '{field}'")]
    OverlappingRanges {
        sensor_kind: String,
        field: String,
        first: i64,
        second: i64,
    },

    /// Same condition id submitted twice in one batch
    #[error("Duplicate condition id {0}")]
    DuplicateConditionId(i64),
}

impl RuleError {
    pub(crate) fn invalid(id: i64, reason: impl Into<String>) -> Self {
        RuleError::InvalidCondition {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        RuleError::MalformedPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<RuleError> for FieldwatchError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::MalformedPath { .. } => FieldwatchError::MalformedPath(err.to_string()),
            RuleError::InvalidCondition { .. } | RuleError::DuplicateConditionId(_) => {
                FieldwatchError::InvalidCondition(err.to_string())
            },
            RuleError::OverlappingRanges { .. } => {
                FieldwatchError::OverlappingRanges(err.to_string())
            },
        }
    }
}
