//! Fieldwatch Rules - Alarm Condition Engine
//!
//! Turns a decoded sensor reading into the list of alarm conditions it
//! satisfies:
//! - Identity parsing from ingestion paths
//! - Condition validation (per-condition invariants, range overlap per batch)
//! - Condition store publishing immutable snapshots
//! - Condition evaluation with plain and tolerance range semantics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ parse_identity│────▶│ ConditionStore   │────▶│  Evaluator   │
//! │  (path)       │     │ (Arc snapshot)   │     │ (fired list) │
//! └──────────────┘     └──────────────────┘     └──────────────┘
//!                             ▲
//!                             │ replace_sensor_kind (validated)
//!                      administrative writes
//! ```

mod error;
mod evaluator;
mod identity;
mod store;
pub mod validation;

pub use error::{Result, RuleError};
pub use evaluator::{condition_matches, ConditionEvaluator, FiredCondition};
pub use identity::{parse_identity, MIN_PATH_SEGMENTS};
pub use store::{ConditionSnapshot, ConditionStore};
pub use validation::{validate_condition, validate_condition_set};
