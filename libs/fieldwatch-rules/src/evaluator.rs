//! Condition Evaluator - match a sensor reading against a condition set
//!
//! Evaluation is field-major: for every field of the reading, every
//! applicable condition is tested and each match is reported. There is no
//! early exit, so one reading can fire several severities and fields at once.

use std::sync::Arc;

use fieldwatch_model::{Condition, DataType, FieldValue, Operator, RangeMode, SensorReading};
use tracing::{debug, warn};

use crate::error::{Result, RuleError};
use crate::validation::validate_condition;

/// One satisfied (field, condition) pair
#[derive(Debug, Clone, PartialEq)]
pub struct FiredCondition {
    pub condition: Arc<Condition>,
    pub field: String,
    pub value: FieldValue,
}

/// Stateless evaluator
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Return every (field, condition) pair the reading satisfies
    ///
    /// `conditions` is expected to be the active set of the reading's
    /// sensor kind, taken from a single snapshot. A condition that breaks
    /// its own invariants is logged and skipped; the rest still run.
    pub fn evaluate(
        &self,
        reading: &SensorReading,
        conditions: &[Arc<Condition>],
    ) -> Vec<FiredCondition> {
        let usable: Vec<&Arc<Condition>> = conditions
            .iter()
            .filter(|condition| match validate_condition(condition) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Skipping condition {} for device {}: {}",
                        condition.id, reading.device_id, e
                    );
                    false
                },
            })
            .collect();

        let mut fired = Vec::new();
        for (field, value) in &reading.fields {
            for condition in &usable {
                if condition.data_type != value.data_type() || !condition.applies_to_field(field) {
                    continue;
                }
                match condition_matches(condition, value) {
                    Ok(true) => fired.push(FiredCondition {
                        condition: Arc::clone(condition),
                        field: field.clone(),
                        value: *value,
                    }),
                    Ok(false) => {},
                    Err(e) => warn!("Condition {} not evaluated: {}", condition.id, e),
                }
            }
        }

        debug!(
            "Evaluated {}/{}: {} fields, {} conditions, {} fired",
            reading.device_id,
            reading.sensor_kind,
            reading.fields.len(),
            usable.len(),
            fired.len()
        );
        fired
    }
}

/// Test one value against one condition
///
/// Errors when the value's type differs from the condition's data type or
/// when a threshold the operator needs is missing.
pub fn condition_matches(condition: &Condition, value: &FieldValue) -> Result<bool> {
    match (condition.data_type, value) {
        (DataType::Numeric, FieldValue::Numeric(v)) => numeric_matches(condition, *v),
        (DataType::Boolean, FieldValue::Boolean(b)) => boolean_matches(condition, *b),
        (expected, _) => Err(RuleError::invalid(
            condition.id,
            format!("{} condition cannot test a {} value", expected, value.data_type()),
        )),
    }
}

fn numeric_matches(condition: &Condition, value: f64) -> Result<bool> {
    let t1 = condition
        .threshold1
        .ok_or_else(|| RuleError::invalid(condition.id, "missing threshold1"))?;

    let matched = match condition.operator {
        Operator::GreaterThan => value > t1,
        Operator::GreaterOrEqual => value >= t1,
        Operator::LessThan => value < t1,
        Operator::LessOrEqual => value <= t1,
        Operator::Equal => value == t1,
        Operator::NotEqual => value != t1,
        Operator::Between => {
            let t2 = condition
                .threshold2
                .ok_or_else(|| RuleError::invalid(condition.id, "missing threshold2"))?;
            match condition.range_mode {
                RangeMode::Inclusive => t1 <= value && value <= t2,
                // t1 = tolerance, t2 = center; the band edges themselves fire
                RangeMode::Tolerance => value <= t2 - t1 || value >= t2 + t1,
            }
        },
    };
    Ok(matched)
}

fn boolean_matches(condition: &Condition, value: bool) -> Result<bool> {
    let expected = condition
        .bool_threshold
        .ok_or_else(|| RuleError::invalid(condition.id, "missing bool_threshold"))?;

    match condition.operator {
        Operator::Equal => Ok(value == expected),
        Operator::NotEqual => Ok(value != expected),
        other => Err(RuleError::invalid(
            condition.id,
            format!("BOOLEAN condition does not support {}", other),
        )),
    }
}
