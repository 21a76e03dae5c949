//! Integration tests for the condition engine
//!
//! Path parsing, batch validation through the store and evaluation against
//! a published snapshot.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;
use std::thread;

use fieldwatch_model::{Condition, Operator, SensorReading, Severity};
use fieldwatch_rules::{parse_identity, ConditionEvaluator, ConditionStore, RuleError};
use serde_json::json;

fn reading_for(path: &str) -> SensorReading {
    SensorReading::new(parse_identity(path).unwrap())
}

#[test]
fn test_plain_between_end_to_end() {
    let store = ConditionStore::new();
    store
        .replace_sensor_kind(
            "TH",
            vec![Condition::between(1, "TH", Severity::Warning, 25.0, 30.0).with_name("Warm")],
        )
        .unwrap();

    let snapshot = store.snapshot();
    let conditions = snapshot.conditions_for("TH").unwrap();
    let evaluator = ConditionEvaluator::new();

    let hot = reading_for("fw/site-a/dev-01/TH_v1/data").with_field("temperature", 28.0);
    let fired = evaluator.evaluate(&hot, conditions);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].condition.severity, Severity::Warning);
    assert_eq!(fired[0].field, "temperature");

    let mild = reading_for("fw/site-a/dev-01/TH_v1/data").with_field("temperature", 22.0);
    assert!(evaluator.evaluate(&mild, conditions).is_empty());
}

#[test]
fn test_tolerance_boundaries() {
    let store = ConditionStore::new();
    store
        .replace_sensor_kind(
            "TILT",
            vec![Condition::tolerance(7, "TILT", Severity::Danger, 5.0, 90.0).with_field("angle_x")],
        )
        .unwrap();
    let snapshot = store.snapshot();
    let conditions = snapshot.conditions_for("TILT").unwrap();

    for (value, fires) in [(85.0, true), (90.0, false), (84.0, true), (96.0, true)] {
        let reading =
            reading_for("fw/site-a/tilt-9/TILT_x/data").with_field("angle_x", value);
        let fired = ConditionEvaluator::new().evaluate(&reading, conditions);
        assert_eq!(!fired.is_empty(), fires, "angle {}", value);
    }
}

#[test]
fn test_boolean_rejects_ordering_operators() {
    for op in [
        Operator::GreaterThan,
        Operator::GreaterOrEqual,
        Operator::LessThan,
        Operator::LessOrEqual,
        Operator::Between,
    ] {
        let condition = Condition::boolean(1, "DOOR", Severity::Caution, op, true);
        let err = ConditionStore::new()
            .replace_sensor_kind("DOOR", vec![condition])
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidCondition { id: 1, .. }), "{}", op);
    }
}

#[test]
fn test_overlapping_batch_rejected_whole() {
    let store = ConditionStore::new();
    let batch = vec![
        Condition::between(1, "TH", Severity::Warning, 25.0, 30.0),
        Condition::numeric(2, "TH", Severity::Danger, Operator::GreaterOrEqual, 29.0),
    ];
    let err = store.replace_sensor_kind("TH", batch).unwrap_err();
    assert!(matches!(err, RuleError::OverlappingRanges { .. }));
    assert!(store.snapshot().conditions_for("TH").is_none());

    // Touching at an endpoint is fine
    store
        .replace_sensor_kind(
            "TH",
            vec![
                Condition::between(1, "TH", Severity::Warning, 25.0, 30.0),
                Condition::numeric(2, "TH", Severity::Danger, Operator::GreaterThan, 30.0),
            ],
        )
        .unwrap();
}

#[test]
fn test_shared_inclusive_boundary_rejected() {
    let store = ConditionStore::new();
    let err = store
        .replace_sensor_kind(
            "TH",
            vec![
                Condition::numeric(1, "TH", Severity::Warning, Operator::GreaterOrEqual, 30.0),
                Condition::numeric(2, "TH", Severity::Danger, Operator::LessOrEqual, 30.0),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, RuleError::OverlappingRanges { first: 1, second: 2, .. }));
    assert!(store.snapshot().conditions_for("TH").is_none());

    // Both would fire on exactly 30.0 otherwise
    let reading = reading_for("fw/site-a/th-0001/TH_v2/data").with_field("temperature", 30.0);
    let ge = Condition::numeric(1, "TH", Severity::Warning, Operator::GreaterOrEqual, 30.0);
    let le = Condition::numeric(2, "TH", Severity::Danger, Operator::LessOrEqual, 30.0);
    let conditions = [Arc::new(ge), Arc::new(le)];
    assert_eq!(ConditionEvaluator::new().evaluate(&reading, &conditions).len(), 2);
}

#[test]
fn test_conditions_from_json() {
    let payload = json!([
        {
            "id": 1,
            "sensor_kind": "TH",
            "name": "Too warm",
            "severity": "WARNING",
            "data_type": "NUMERIC",
            "operator": "BETWEEN",
            "threshold1": 25.0,
            "threshold2": 30.0,
            "field": "temperature",
            "cooldown_secs": 300
        },
        {
            "id": 2,
            "sensor_kind": "TH",
            "severity": "CAUTION",
            "data_type": "BOOLEAN",
            "operator": "EQUAL",
            "bool_threshold": true,
            "notify": false
        }
    ]);
    let conditions: Vec<Condition> = serde_json::from_value(payload).unwrap();

    let store = ConditionStore::new();
    assert_eq!(store.load(conditions).unwrap(), 2);

    let snapshot = store.snapshot();
    let stored = snapshot.conditions_for("TH").unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].cooldown_secs, 300);
    assert!(!stored[1].notify);
}

#[test]
fn test_concurrent_readers_see_whole_snapshots() {
    let store = Arc::new(ConditionStore::new());
    store
        .replace_sensor_kind(
            "TH",
            vec![Condition::between(1, "TH", Severity::Warning, 25.0, 30.0)],
        )
        .unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = store.snapshot();
                    let count = snapshot.conditions_for("TH").map_or(0, <[_]>::len);
                    assert!(count == 1 || count == 2);
                }
            })
        })
        .collect();

    for i in 0..50 {
        let batch = if i % 2 == 0 {
            vec![
                Condition::between(1, "TH", Severity::Warning, 25.0, 30.0),
                Condition::numeric(2, "TH", Severity::Danger, Operator::GreaterThan, 30.0),
            ]
        } else {
            vec![Condition::between(1, "TH", Severity::Warning, 25.0, 30.0)]
        };
        store.replace_sensor_kind("TH", batch).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.version(), 51);
}
