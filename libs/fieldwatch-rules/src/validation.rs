//! Condition validation
//!
//! Runs at write time (administrative batch replace, config seeding). The
//! evaluator re-checks single-condition invariants per reading and never
//! rejects a whole batch.

use std::collections::HashSet;

use fieldwatch_model::{Condition, DataType, Operator, RangeMode};

use crate::error::{Result, RuleError};

/// Check the invariants of a single condition
pub fn validate_condition(condition: &Condition) -> Result<()> {
    let id = condition.id;

    if condition.sensor_kind.is_empty() {
        return Err(RuleError::invalid(id, "sensor kind must not be empty"));
    }
    if matches!(condition.field.as_deref(), Some("")) {
        return Err(RuleError::invalid(id, "field binding must not be empty"));
    }
    for threshold in [condition.threshold1, condition.threshold2].into_iter().flatten() {
        if !threshold.is_finite() {
            return Err(RuleError::invalid(id, "thresholds must be finite"));
        }
    }

    match condition.data_type {
        DataType::Numeric => validate_numeric(condition),
        DataType::Boolean => validate_boolean(condition),
    }
}

fn validate_numeric(condition: &Condition) -> Result<()> {
    let id = condition.id;

    let Some(threshold1) = condition.threshold1 else {
        return Err(RuleError::invalid(id, "NUMERIC condition requires threshold1"));
    };
    if condition.bool_threshold.is_some() {
        return Err(RuleError::invalid(
            id,
            "NUMERIC condition must not carry a boolean threshold",
        ));
    }

    if condition.operator == Operator::Between {
        let Some(threshold2) = condition.threshold2 else {
            return Err(RuleError::invalid(id, "BETWEEN requires threshold2"));
        };
        match condition.range_mode {
            RangeMode::Inclusive if threshold1 > threshold2 => {
                return Err(RuleError::invalid(
                    id,
                    format!("BETWEEN lower bound {} exceeds upper bound {}", threshold1, threshold2),
                ));
            },
            RangeMode::Tolerance if threshold1 < 0.0 => {
                return Err(RuleError::invalid(id, "tolerance must not be negative"));
            },
            _ => {},
        }
    } else {
        if condition.threshold2.is_some() {
            return Err(RuleError::invalid(
                id,
                format!("{} does not accept threshold2", condition.operator),
            ));
        }
        if condition.range_mode == RangeMode::Tolerance {
            return Err(RuleError::invalid(id, "TOLERANCE range mode requires BETWEEN"));
        }
    }

    Ok(())
}

fn validate_boolean(condition: &Condition) -> Result<()> {
    let id = condition.id;

    if condition.bool_threshold.is_none() {
        return Err(RuleError::invalid(id, "BOOLEAN condition requires bool_threshold"));
    }
    if condition.threshold1.is_some() || condition.threshold2.is_some() {
        return Err(RuleError::invalid(
            id,
            "BOOLEAN condition must not carry numeric thresholds",
        ));
    }
    if !condition.operator.is_equality() {
        return Err(RuleError::invalid(
            id,
            format!("BOOLEAN condition does not support {}", condition.operator),
        ));
    }
    if condition.range_mode != RangeMode::Inclusive {
        return Err(RuleError::invalid(id, "BOOLEAN condition has no range mode"));
    }

    Ok(())
}

/// Validate a full replacement set for one sensor kind
///
/// Rejects the whole batch on the first problem:
/// 1. any condition failing [`validate_condition`]
/// 2. a condition belonging to another sensor kind
/// 3. duplicate ids
/// 4. overlapping firing ranges among inclusive NUMERIC conditions that can
///    see the same field
pub fn validate_condition_set(sensor_kind: &str, conditions: &[Condition]) -> Result<()> {
    let mut seen = HashSet::with_capacity(conditions.len());

    for condition in conditions {
        validate_condition(condition)?;
        if condition.sensor_kind != sensor_kind {
            return Err(RuleError::invalid(
                condition.id,
                format!(
                    "belongs to sensor kind '{}', not '{}'",
                    condition.sensor_kind, sensor_kind
                ),
            ));
        }
        if !seen.insert(condition.id) {
            return Err(RuleError::DuplicateConditionId(condition.id));
        }
    }

    let ranged: Vec<(&Condition, Vec<Span>)> = conditions
        .iter()
        .filter(|c| c.data_type == DataType::Numeric && c.range_mode == RangeMode::Inclusive)
        .map(|c| (c, firing_spans(c)))
        .collect();

    for (i, (first, first_spans)) in ranged.iter().enumerate() {
        for (second, second_spans) in &ranged[i + 1..] {
            if !share_field(first, second) {
                continue;
            }
            // Contiguous BETWEEN bands may share a boundary value
            let bands =
                first.operator == Operator::Between && second.operator == Operator::Between;
            let clash = first_spans.iter().any(|a| {
                second_spans.iter().any(|b| match a.intersection(b) {
                    Some(common) => !(bands && common.is_point()),
                    None => false,
                })
            });
            if clash {
                return Err(RuleError::OverlappingRanges {
                    sensor_kind: sensor_kind.to_string(),
                    field: first
                        .field
                        .clone()
                        .or_else(|| second.field.clone())
                        .unwrap_or_else(|| "*".to_string()),
                    first: first.id,
                    second: second.id,
                });
            }
        }
    }

    Ok(())
}

/// Two conditions can see the same field unless both are bound to different ones
fn share_field(a: &Condition, b: &Condition) -> bool {
    match (&a.field, &b.field) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

/// Interval of values on which a condition fires
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    lo: f64,
    lo_closed: bool,
    hi: f64,
    hi_closed: bool,
}

impl Span {
    fn closed(lo: f64, hi: f64) -> Self {
        Self {
            lo,
            lo_closed: true,
            hi,
            hi_closed: true,
        }
    }

    fn open(lo: f64, hi: f64) -> Self {
        Self {
            lo,
            lo_closed: false,
            hi,
            hi_closed: false,
        }
    }

    fn above(t: f64, inclusive: bool) -> Self {
        Self {
            lo: t,
            lo_closed: inclusive,
            hi: f64::INFINITY,
            hi_closed: false,
        }
    }

    fn below(t: f64, inclusive: bool) -> Self {
        Self {
            lo: f64::NEG_INFINITY,
            lo_closed: false,
            hi: t,
            hi_closed: inclusive,
        }
    }

    fn is_point(&self) -> bool {
        self.lo == self.hi
    }

    /// Common values of both spans, `None` when there are none
    fn intersection(&self, other: &Span) -> Option<Span> {
        let (lo, lo_closed) = if self.lo > other.lo {
            (self.lo, self.lo_closed)
        } else if other.lo > self.lo {
            (other.lo, other.lo_closed)
        } else {
            (self.lo, self.lo_closed && other.lo_closed)
        };
        let (hi, hi_closed) = if self.hi < other.hi {
            (self.hi, self.hi_closed)
        } else if other.hi < self.hi {
            (other.hi, other.hi_closed)
        } else {
            (self.hi, self.hi_closed && other.hi_closed)
        };

        let non_empty = lo < hi || (lo == hi && lo_closed && hi_closed);
        non_empty.then_some(Span {
            lo,
            lo_closed,
            hi,
            hi_closed,
        })
    }
}

/// Firing spans of a validated inclusive NUMERIC condition
fn firing_spans(condition: &Condition) -> Vec<Span> {
    let t1 = condition.threshold1.unwrap_or_default();
    let t2 = condition.threshold2.unwrap_or_default();
    match condition.operator {
        Operator::GreaterThan => vec![Span::above(t1, false)],
        Operator::GreaterOrEqual => vec![Span::above(t1, true)],
        Operator::LessThan => vec![Span::below(t1, false)],
        Operator::LessOrEqual => vec![Span::below(t1, true)],
        Operator::Between => vec![Span::closed(t1, t2)],
        Operator::Equal => vec![Span::closed(t1, t1)],
        Operator::NotEqual => vec![
            Span::open(f64::NEG_INFINITY, t1),
            Span::open(t1, f64::INFINITY),
        ],
    }
}
