//! Request and response bodies

use std::collections::BTreeMap;

use fieldwatch_model::FieldValue;
use serde::{Deserialize, Serialize};

/// `GET /api/alarms/subscribe` query
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
}

/// `POST /api/ingest` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub path: String,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub period: Option<u32>,
}

/// Reading accepted but not evaluated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipResponse {
    pub skipped: bool,
    pub reason: String,
    pub message: String,
}

/// Result of a condition batch replace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionsReplaced {
    pub sensor_kind: String,
    pub count: usize,
    pub version: u64,
}
