//! Common test utilities and helpers

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alarmsrv::config::{AlarmsrvConfig, BusSection};
use alarmsrv::{AlarmService, Broadcaster, DispatchError, DispatchReport, MemoryEventRecorder};
use chrono::Utc;
use fieldwatch_model::{AlarmEvent, Condition, Operator, Severity};
use parking_lot::Mutex;

pub const TH_PATH: &str = "fw/site-north/th-0001/TH_v2/data";

/// Plain BETWEEN 25..30 WARNING on temperature
pub fn warm_condition() -> Condition {
    Condition::between(1, "TH", Severity::Warning, 25.0, 30.0)
        .with_name("Temperature high")
        .with_field("temperature")
}

pub fn test_config() -> AlarmsrvConfig {
    let mut config = AlarmsrvConfig::default();
    config.bus.poll_timeout_ms = 20;
    config.bus.backoff_base_ms = 10;
    config.bus.backoff_max_ms = 100;
    config.bus.shutdown_grace_ms = 500;
    config
        .devices
        .insert("th-0001".to_string(), "site-north".to_string());
    config.conditions = vec![
        warm_condition(),
        Condition::boolean(3, "TH", Severity::Caution, Operator::Equal, true)
            .with_field("leak")
            .with_notify(false),
    ];
    config
}

pub fn fast_bus(capacity: usize) -> BusSection {
    BusSection {
        capacity,
        poll_timeout_ms: 20,
        backoff_base_ms: 10,
        backoff_max_ms: 100,
        shutdown_grace_ms: 500,
    }
}

pub fn start_service(config: AlarmsrvConfig) -> (Arc<AlarmService>, MemoryEventRecorder) {
    let recorder = MemoryEventRecorder::new();
    let service = AlarmService::start_with_recorder(config, Arc::new(recorder.clone())).unwrap();
    (service, recorder)
}

pub fn sample_event(seq: i64) -> AlarmEvent {
    let condition = Condition::between(seq, "TH", Severity::Warning, 25.0, 30.0);
    AlarmEvent::new("th-0001", "site-north", &condition, "temperature", 28.0.into(), Utc::now())
}

/// Poll `check` until it holds or `limit` passes
pub async fn wait_until<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check().await
}

/// Broadcaster that remembers payloads and can misbehave on demand
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    pub payloads: Mutex<Vec<String>>,
    /// Return an error for this many calls
    pub fail_next: AtomicUsize,
    /// Panic on the next call
    pub panic_next: AtomicBool,
}

impl RecordingBroadcaster {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, payload: Arc<str>) -> Result<DispatchReport, DispatchError> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("broadcaster blew up");
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DispatchError::Broadcast("transport exploded".to_string()));
        }
        self.payloads.lock().push(payload.to_string());
        Ok(DispatchReport {
            delivered: 1,
            ..DispatchReport::default()
        })
    }

    fn connection_count(&self) -> usize {
        1
    }
}
