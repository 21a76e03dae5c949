//! Decoded sensor readings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::DataType;

/// Device and sensor kind extracted from an ingestion path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub sensor_kind: String,
}

/// A single measured value
///
/// Deserializes from a bare JSON number or boolean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Numeric(f64),
}

impl FieldValue {
    pub fn data_type(&self) -> DataType {
        match self {
            FieldValue::Numeric(_) => DataType::Numeric,
            FieldValue::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(v) => Some(*v),
            FieldValue::Boolean(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            FieldValue::Numeric(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Numeric(v) => write!(f, "{}", v),
            FieldValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Numeric(v)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

/// One decoded measurement sample, alive for a single evaluation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub device_id: String,
    pub sensor_kind: String,
    /// Named field values, iterated in name order
    pub fields: BTreeMap<String, FieldValue>,
    /// Reporting period in seconds, when the device states one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
}

impl SensorReading {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            device_id: identity.device_id,
            sensor_kind: identity.sensor_kind,
            fields: BTreeMap::new(),
            period: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_period(mut self, period: u32) -> Self {
        self.period = Some(period);
        self
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_field_value_untagged() {
        let fields: BTreeMap<String, FieldValue> =
            serde_json::from_str(r#"{"temperature": 28.5, "door_open": true, "count": 3}"#)
                .unwrap();
        assert_eq!(fields["temperature"], FieldValue::Numeric(28.5));
        assert_eq!(fields["door_open"], FieldValue::Boolean(true));
        assert_eq!(fields["count"], FieldValue::Numeric(3.0));
        assert_eq!(fields["door_open"].data_type(), DataType::Boolean);
    }

    #[test]
    fn test_reading_builder() {
        let reading = SensorReading::new(DeviceIdentity {
            device_id: "dev-01".into(),
            sensor_kind: "TH".into(),
        })
        .with_field("temperature", 21.0)
        .with_period(60);
        assert_eq!(reading.fields.len(), 1);
        assert_eq!(reading.period, Some(60));
    }
}
