//! Alarm condition definition
//!
//! A condition is an administratively managed alarm rule attached to a
//! sensor kind. The evaluator only ever reads conditions; invariants are
//! enforced by `fieldwatch_rules::validation` when conditions are stored.

use serde::{Deserialize, Serialize};

use crate::types::{DataType, Operator, RangeMode, Severity};

/// Stored alarm rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Unique identifier
    pub id: i64,

    /// Sensor kind this condition belongs to
    pub sensor_kind: String,

    /// Display name shown on dashboards
    #[serde(default)]
    pub name: String,

    /// Severity reported when the condition fires
    pub severity: Severity,

    /// Inactive conditions are excluded from evaluation
    #[serde(default = "default_true")]
    pub active: bool,

    /// When false the firing is recorded but never pushed to clients
    #[serde(default = "default_true")]
    pub notify: bool,

    /// Ordering within a sensor kind (ascending)
    #[serde(default)]
    pub display_order: i32,

    pub data_type: DataType,

    pub operator: Operator,

    /// Numeric threshold (tolerance in `RangeMode::Tolerance`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold1: Option<f64>,

    /// Upper bound for BETWEEN (center in `RangeMode::Tolerance`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold2: Option<f64>,

    /// Expected value for BOOLEAN conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_threshold: Option<bool>,

    /// Restrict the condition to one measured field; `None` applies it to
    /// every field of matching data type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default)]
    pub range_mode: RangeMode,

    /// Minimum seconds between forwarded notifications per device (0 = none)
    #[serde(default)]
    pub cooldown_secs: u64,
}

fn default_true() -> bool {
    true
}

impl Condition {
    fn base(id: i64, sensor_kind: impl Into<String>, severity: Severity) -> Self {
        Self {
            id,
            sensor_kind: sensor_kind.into(),
            name: String::new(),
            severity,
            active: true,
            notify: true,
            display_order: 0,
            data_type: DataType::Numeric,
            operator: Operator::Equal,
            threshold1: None,
            threshold2: None,
            bool_threshold: None,
            field: None,
            range_mode: RangeMode::Inclusive,
            cooldown_secs: 0,
        }
    }

    /// Single-threshold numeric condition (`>`, `>=`, `<`, `<=`, `==`, `!=`)
    pub fn numeric(
        id: i64,
        sensor_kind: impl Into<String>,
        severity: Severity,
        operator: Operator,
        threshold: f64,
    ) -> Self {
        Self {
            operator,
            threshold1: Some(threshold),
            ..Self::base(id, sensor_kind, severity)
        }
    }

    /// Inclusive numeric range `[low, high]`
    pub fn between(
        id: i64,
        sensor_kind: impl Into<String>,
        severity: Severity,
        low: f64,
        high: f64,
    ) -> Self {
        Self {
            operator: Operator::Between,
            threshold1: Some(low),
            threshold2: Some(high),
            ..Self::base(id, sensor_kind, severity)
        }
    }

    /// Tolerance band around `center`; fires at or beyond `center ± tolerance`
    pub fn tolerance(
        id: i64,
        sensor_kind: impl Into<String>,
        severity: Severity,
        tolerance: f64,
        center: f64,
    ) -> Self {
        Self {
            operator: Operator::Between,
            threshold1: Some(tolerance),
            threshold2: Some(center),
            range_mode: RangeMode::Tolerance,
            ..Self::base(id, sensor_kind, severity)
        }
    }

    /// Boolean condition (`==` or `!=` against `expected`)
    pub fn boolean(
        id: i64,
        sensor_kind: impl Into<String>,
        severity: Severity,
        operator: Operator,
        expected: bool,
    ) -> Self {
        Self {
            data_type: DataType::Boolean,
            operator,
            bool_threshold: Some(expected),
            ..Self::base(id, sensor_kind, severity)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_cooldown_secs(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = order;
        self
    }

    /// Name for dashboards, falling back to a generated one
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        match (self.data_type, self.operator, self.range_mode) {
            (DataType::Boolean, op, _) => format!(
                "{} {} {}",
                self.severity,
                op.symbol(),
                self.bool_threshold.unwrap_or_default()
            ),
            (DataType::Numeric, Operator::Between, RangeMode::Tolerance) => format!(
                "{} outside {}±{}",
                self.severity,
                self.threshold2.unwrap_or_default(),
                self.threshold1.unwrap_or_default()
            ),
            (DataType::Numeric, Operator::Between, RangeMode::Inclusive) => format!(
                "{} {}..{}",
                self.severity,
                self.threshold1.unwrap_or_default(),
                self.threshold2.unwrap_or_default()
            ),
            (DataType::Numeric, op, _) => format!(
                "{} {} {}",
                self.severity,
                op.symbol(),
                self.threshold1.unwrap_or_default()
            ),
        }
    }

    /// Whether this condition is tested against the given field name
    pub fn applies_to_field(&self, field: &str) -> bool {
        self.field.as_deref().map_or(true, |f| f == field)
    }
}
