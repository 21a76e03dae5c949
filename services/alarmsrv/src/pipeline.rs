//! Ingestion pipeline
//!
//! path → identity → device directory → condition snapshot → evaluator,
//! then per fired condition: dedup → bus, and always a record.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fieldwatch_model::{AlarmEvent, EventRecord, FieldValue, SensorReading};
use fieldwatch_rules::{parse_identity, ConditionEvaluator, ConditionStore};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::bus::AlarmEventBus;
use crate::dedup::NotificationDeduplicator;
use crate::directory::DeviceDirectory;
use crate::error::IngestSkip;
use crate::recorder::EventRecorder;

/// Result of one evaluated reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub device_id: String,
    pub sensor_kind: String,
    /// Satisfied (field, condition) pairs
    pub fired: usize,
    /// Records written successfully
    pub recorded: usize,
    /// Events accepted by the bus
    pub forwarded: usize,
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub ingested: u64,
    pub skipped: u64,
    pub fired: u64,
    pub record_failures: u64,
}

#[derive(Debug, Default)]
struct PipelineCounters {
    ingested: AtomicU64,
    skipped: AtomicU64,
    fired: AtomicU64,
    record_failures: AtomicU64,
}

/// Wires evaluation to recording and notification
pub struct AlarmPipeline {
    store: Arc<ConditionStore>,
    evaluator: ConditionEvaluator,
    directory: Arc<dyn DeviceDirectory>,
    recorder: Arc<dyn EventRecorder>,
    dedup: Arc<NotificationDeduplicator>,
    bus: Arc<AlarmEventBus>,
    counters: PipelineCounters,
}

impl AlarmPipeline {
    pub fn new(
        store: Arc<ConditionStore>,
        directory: Arc<dyn DeviceDirectory>,
        recorder: Arc<dyn EventRecorder>,
        dedup: Arc<NotificationDeduplicator>,
        bus: Arc<AlarmEventBus>,
    ) -> Self {
        Self {
            store,
            evaluator: ConditionEvaluator::new(),
            directory,
            recorder,
            dedup,
            bus,
            counters: PipelineCounters::default(),
        }
    }

    /// Evaluate one reading now
    pub async fn ingest(
        &self,
        path: &str,
        fields: BTreeMap<String, FieldValue>,
        period: Option<u32>,
    ) -> Result<IngestOutcome, IngestSkip> {
        self.ingest_at(path, fields, period, Utc::now()).await
    }

    /// Evaluate one reading at an explicit time
    ///
    /// Skips are logged and returned; nothing here propagates as a failure
    /// to the ingestion transport.
    pub async fn ingest_at(
        &self,
        path: &str,
        fields: BTreeMap<String, FieldValue>,
        period: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestSkip> {
        let prepared = self.prepare(path, fields, period);
        let (reading, site_id) = match prepared {
            Ok(ready) => ready,
            Err(skip) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                warn!("Reading skipped ({}): {}", skip.reason(), skip);
                return Err(skip);
            },
        };

        // One snapshot for the whole pass
        let snapshot = self.store.snapshot();
        let Some(conditions) = snapshot.conditions_for(&reading.sensor_kind) else {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            let skip = IngestSkip::UnknownSensorKind(reading.sensor_kind.clone());
            warn!("Reading skipped ({}): {}", skip.reason(), skip);
            return Err(skip);
        };
        self.counters.ingested.fetch_add(1, Ordering::Relaxed);

        let fired = self.evaluator.evaluate(&reading, conditions);
        self.counters
            .fired
            .fetch_add(fired.len() as u64, Ordering::Relaxed);

        let mut outcome = IngestOutcome {
            device_id: reading.device_id.clone(),
            sensor_kind: reading.sensor_kind.clone(),
            fired: fired.len(),
            recorded: 0,
            forwarded: 0,
        };

        for hit in &fired {
            let condition = hit.condition.as_ref();

            let forwarded = condition.notify
                && self.dedup.should_notify(
                    &reading.device_id,
                    condition.id,
                    condition.cooldown_secs,
                    now,
                )
                && self.bus.publish(AlarmEvent::new(
                    &reading.device_id,
                    &site_id,
                    condition,
                    &hit.field,
                    hit.value,
                    now,
                ));
            if forwarded {
                outcome.forwarded += 1;
            }

            let mut record =
                EventRecord::new(&reading.device_id, &site_id, condition, &hit.field, hit.value, now);
            record.notified = forwarded;
            match self.recorder.record(&record).await {
                Ok(()) => outcome.recorded += 1,
                Err(e) => {
                    self.counters.record_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "Failed to record event for {} condition {}: {}",
                        reading.device_id, condition.id, e
                    );
                },
            }
        }

        debug!(
            "Ingested {}/{}: fired={} recorded={} forwarded={}",
            outcome.device_id, outcome.sensor_kind, outcome.fired, outcome.recorded, outcome.forwarded
        );
        Ok(outcome)
    }

    fn prepare(
        &self,
        path: &str,
        fields: BTreeMap<String, FieldValue>,
        period: Option<u32>,
    ) -> Result<(SensorReading, String), IngestSkip> {
        let identity = parse_identity(path)?;
        if fields.is_empty() {
            return Err(IngestSkip::EmptyReading);
        }
        let site_id = self
            .directory
            .site_of(&identity.device_id)
            .ok_or_else(|| IngestSkip::UnknownDevice(identity.device_id.clone()))?;

        let mut reading = SensorReading::new(identity);
        reading.fields = fields;
        reading.period = period;
        Ok((reading, site_id))
    }

    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            ingested: c.ingested.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            fired: c.fired.load(Ordering::Relaxed),
            record_failures: c.record_failures.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self) -> &Arc<ConditionStore> {
        &self.store
    }
}
