//! Fieldwatch Model Library
//!
//! Pure domain types shared by the rule engine and the alarm service.
//! No I/O, no async, no service dependencies.
//!
//! # Modules
//!
//! - `types`: severity, data type, comparison operator and range mode enums
//! - `condition`: stored alarm rule definition
//! - `reading`: decoded sensor readings and field values
//! - `event`: alarm events pushed to clients and persisted event records

pub mod condition;
pub mod event;
pub mod reading;
pub mod types;

pub use condition::Condition;
pub use event::{AlarmEvent, EventRecord};
pub use reading::{DeviceIdentity, FieldValue, SensorReading};
pub use types::{DataType, Operator, RangeMode, Severity};
