//! AlarmSrv configuration
//!
//! Layered with figment: compiled defaults, then the YAML file, then
//! `ALARMSRV_` environment variables (`__` separates nested keys, e.g.
//! `ALARMSRV_BUS__CAPACITY=20000`).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use common::LoggingSection;
use errors::FieldwatchError;
use fieldwatch_model::Condition;
use fieldwatch_rules::validate_condition_set;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default config file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/alarmsrv.yaml";

/// Default API port
pub const DEFAULT_PORT: u16 = 6002;

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmsrvConfig {
    pub api: ApiSection,
    pub bus: BusSection,
    pub push: PushSection,
    pub recorder: RecorderSection,
    pub logging: LoggingSection,
    /// Device id to owning site id
    pub devices: HashMap<String, String>,
    /// Seed conditions, validated per sensor kind at load time
    pub conditions: Vec<Condition>,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub host: String,
    pub port: u16,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Alarm event bus tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSection {
    /// Bounded queue capacity; publishes beyond it are dropped
    pub capacity: usize,
    /// How long the consumer waits for an event before re-checking shutdown
    pub poll_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Bound on consumer exit and connection close at shutdown
    pub shutdown_grace_ms: u64,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            poll_timeout_ms: 1_000,
            backoff_base_ms: 100,
            backoff_max_ms: 30_000,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl BusSection {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Push connection lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushSection {
    /// Connections older than this are evicted by the sweep
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub stats_interval_secs: u64,
    /// Per-client message buffer
    pub client_buffer: usize,
    pub keep_alive_secs: u64,
}

impl Default for PushSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1_800,
            sweep_interval_secs: 300,
            stats_interval_secs: 60,
            client_buffer: 256,
            keep_alive_secs: 15,
        }
    }
}

impl PushSection {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Event record sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSection {
    pub kind: RecorderKind,
    /// SQLite URL, used when `kind` is `sqlite`
    pub database_url: String,
}

impl Default for RecorderSection {
    fn default() -> Self {
        Self {
            kind: RecorderKind::Memory,
            database_url: "sqlite:data/alarmsrv.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderKind {
    #[default]
    Memory,
    Sqlite,
}

impl AlarmsrvConfig {
    /// Load from `path` (or the default location) plus environment overrides
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        Self::figment(path)
            .extract()
            .map_err(|e| FieldwatchError::Configuration(format!("Failed to load configuration: {}", e)))
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AlarmsrvConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("ALARMSRV_").split("__"))
    }

    /// Check ranges and seed conditions
    pub fn validate(&self) -> Result<()> {
        if self.api.port == 0 {
            return Err(invalid("api.port", "must not be 0"));
        }
        if self.bus.capacity == 0 {
            return Err(invalid("bus.capacity", "must be greater than 0"));
        }
        if self.bus.poll_timeout_ms == 0 {
            return Err(invalid("bus.poll_timeout_ms", "must be greater than 0"));
        }
        if self.bus.backoff_base_ms > self.bus.backoff_max_ms {
            return Err(invalid(
                "bus.backoff_base_ms",
                "must not exceed bus.backoff_max_ms",
            ));
        }
        if self.push.client_buffer == 0 {
            return Err(invalid("push.client_buffer", "must be greater than 0"));
        }
        if self.push.sweep_interval_secs == 0 || self.push.stats_interval_secs == 0 {
            return Err(invalid("push", "timer intervals must be greater than 0"));
        }
        if self.recorder.kind == RecorderKind::Sqlite && self.recorder.database_url.is_empty() {
            return Err(invalid("recorder.database_url", "required for sqlite recorder"));
        }

        for (kind, group) in self.conditions_by_kind() {
            validate_condition_set(kind, &group).map_err(|e| invalid("conditions", e.to_string()))?;
        }

        Ok(())
    }

    fn conditions_by_kind(&self) -> HashMap<&str, Vec<Condition>> {
        let mut grouped: HashMap<&str, Vec<Condition>> = HashMap::new();
        for condition in &self.conditions {
            grouped
                .entry(condition.sensor_kind.as_str())
                .or_default()
                .push(condition.clone());
        }
        grouped
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> FieldwatchError {
    FieldwatchError::InvalidConfig {
        field: field.to_string(),
        reason: reason.into(),
    }
}
