//! Core enums for alarm conditions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Severity
// ============================================================================

/// Alarm severity level
///
/// Ordered: `Normal < Warning < Caution < Danger < Disconnected`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Normal,
    Warning,
    Caution,
    Danger,
    Disconnected,
}

impl Severity {
    /// # Examples
    /// ```
    /// # use fieldwatch_model::Severity;
    /// assert_eq!(Severity::Danger.as_str(), "DANGER");
    /// assert!(Severity::Warning < Severity::Caution);
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "NORMAL",
            Severity::Warning => "WARNING",
            Severity::Caution => "CAUTION",
            Severity::Danger => "DANGER",
            Severity::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(Severity::Normal),
            "WARNING" => Ok(Severity::Warning),
            "CAUTION" => Ok(Severity::Caution),
            "DANGER" => Ok(Severity::Danger),
            "DISCONNECTED" => Ok(Severity::Disconnected),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

// ============================================================================
// Data type
// ============================================================================

/// Value type a condition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Numeric,
    Boolean,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Numeric => "NUMERIC",
            DataType::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Comparison operator
// ============================================================================

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Between,
    Equal,
    NotEqual,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::GreaterThan => "GREATER_THAN",
            Operator::GreaterOrEqual => "GREATER_OR_EQUAL",
            Operator::LessThan => "LESS_THAN",
            Operator::LessOrEqual => "LESS_OR_EQUAL",
            Operator::Between => "BETWEEN",
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
        }
    }

    /// Short symbol used in log lines and default display names
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::Between => "between",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
        }
    }

    /// Operators permitted on BOOLEAN conditions
    pub fn is_equality(&self) -> bool {
        matches!(self, Operator::Equal | Operator::NotEqual)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Range mode
// ============================================================================

/// Interpretation of a BETWEEN condition
///
/// - `Inclusive`: fires when `threshold1 <= value <= threshold2`
/// - `Tolerance`: `threshold1` is a tolerance and `threshold2` a center; fires
///   when `value <= center - tolerance` or `value >= center + tolerance`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeMode {
    #[default]
    Inclusive,
    Tolerance,
}
