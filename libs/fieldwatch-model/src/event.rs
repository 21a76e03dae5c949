//! Alarm events and event records
//!
//! An `AlarmEvent` is the live notification pushed to dashboards; it is
//! never persisted by the bus. An `EventRecord` is written for every firing,
//! whether or not it was forwarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::Condition;
use crate::reading::FieldValue;
use crate::types::Severity;

/// Live alarm notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub device_id: String,
    pub site_id: String,
    pub sensor_kind: String,
    pub field: String,
    pub value: FieldValue,
    pub severity: Severity,
    pub condition_id: i64,
    pub condition_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Persisted record of a fired condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub device_id: String,
    pub site_id: String,
    pub sensor_kind: String,
    pub condition_id: i64,
    pub severity: Severity,
    pub field: String,
    pub value: FieldValue,
    /// Whether the firing was forwarded to the alarm event bus
    pub notified: bool,
    pub recorded_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(
        device_id: &str,
        site_id: &str,
        condition: &Condition,
        field: &str,
        value: FieldValue,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            site_id: site_id.to_string(),
            sensor_kind: condition.sensor_kind.clone(),
            condition_id: condition.id,
            severity: condition.severity,
            field: field.to_string(),
            value,
            notified: false,
            recorded_at,
        }
    }
}

impl AlarmEvent {
    pub fn new(
        device_id: &str,
        site_id: &str,
        condition: &Condition,
        field: &str,
        value: FieldValue,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            site_id: site_id.to_string(),
            sensor_kind: condition.sensor_kind.clone(),
            field: field.to_string(),
            value,
            severity: condition.severity,
            condition_id: condition.id,
            condition_name: condition.display_name(),
            timestamp,
        }
    }
}
