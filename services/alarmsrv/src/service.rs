//! Process lifecycle
//!
//! Builds every component explicitly, starts the bus supervisor and the two
//! periodic timers, and tears them down in order on shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fieldwatch_rules::ConditionStore;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bus::{AlarmEventBus, Broadcaster, BusStats};
use crate::config::{AlarmsrvConfig, RecorderKind};
use crate::dedup::NotificationDeduplicator;
use crate::directory::StaticDeviceDirectory;
use crate::error::Result;
use crate::pipeline::{AlarmPipeline, PipelineStats};
use crate::recorder::{EventRecorder, MemoryEventRecorder, SqliteEventRecorder};
use crate::registry::PushConnectionRegistry;

/// Combined counters for the stats endpoint and the periodic log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub bus: BusStats,
    pub pipeline: PipelineStats,
    pub connections: usize,
    pub dedup_entries: usize,
}

/// Running alarm service
pub struct AlarmService {
    config: AlarmsrvConfig,
    store: Arc<ConditionStore>,
    registry: Arc<PushConnectionRegistry>,
    dedup: Arc<NotificationDeduplicator>,
    bus: Arc<AlarmEventBus>,
    pipeline: Arc<AlarmPipeline>,
    recorder: Arc<dyn EventRecorder>,
    shutdown: CancellationToken,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl AlarmService {
    /// Build the configured recorder, then start everything
    pub async fn start(config: AlarmsrvConfig) -> Result<Arc<Self>> {
        let recorder: Arc<dyn EventRecorder> = match config.recorder.kind {
            RecorderKind::Memory => Arc::new(MemoryEventRecorder::new()),
            RecorderKind::Sqlite => {
                Arc::new(SqliteEventRecorder::connect(&config.recorder.database_url).await?)
            },
        };
        Self::start_with_recorder(config, recorder)
    }

    /// Start with a caller-supplied recorder
    pub fn start_with_recorder(
        config: AlarmsrvConfig,
        recorder: Arc<dyn EventRecorder>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let store = Arc::new(ConditionStore::new());
        if !config.conditions.is_empty() {
            store.load(config.conditions.clone())?;
        }

        let directory: StaticDeviceDirectory = config
            .devices
            .iter()
            .map(|(device, site)| (device.clone(), site.clone()))
            .collect();
        info!("Device directory: {} devices", directory.len());

        let shutdown = CancellationToken::new();
        let registry = Arc::new(PushConnectionRegistry::new(config.push.client_buffer));
        let dedup = Arc::new(NotificationDeduplicator::new());
        let bus = Arc::new(AlarmEventBus::new(
            config.bus.clone(),
            Arc::clone(&registry) as Arc<dyn Broadcaster>,
            shutdown.child_token(),
        ));
        let pipeline = Arc::new(AlarmPipeline::new(
            Arc::clone(&store),
            Arc::new(directory),
            Arc::clone(&recorder),
            Arc::clone(&dedup),
            Arc::clone(&bus),
        ));

        bus.start()?;

        let service = Arc::new(Self {
            config,
            store,
            registry,
            dedup,
            bus,
            pipeline,
            recorder,
            shutdown,
            timers: Mutex::new(Vec::new()),
        });

        let sweep = service.spawn_sweep_timer();
        let stats = service.spawn_stats_timer();
        service.timers.lock().extend([sweep, stats]);

        info!(
            "Alarm service started (recorder={}, conditions={})",
            service.recorder.name(),
            service.store.snapshot().len()
        );
        Ok(service)
    }

    fn spawn_sweep_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let dedup = Arc::clone(&self.dedup);
        let period = self.config.push.sweep_interval();
        let idle_timeout = self.config.push.idle_timeout();
        let token = self.shutdown.child_token();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        registry.sweep_stale(now, idle_timeout);
                        dedup.purge_expired(now);
                    }
                    () = token.cancelled() => break,
                }
            }
            info!("Stale sweep timer stopped");
        })
    }

    fn spawn_stats_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.config.push.stats_interval();
        let token = self.shutdown.child_token();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(service) = weak.upgrade() else { break };
                        let stats = service.stats();
                        info!(
                            "Alarm stats: processed={} dropped={} errors={} restarts={} connections={} dedup={}",
                            stats.bus.processed,
                            stats.bus.dropped,
                            stats.bus.errors,
                            stats.bus.restarts,
                            stats.connections,
                            stats.dedup_entries
                        );
                    }
                    () = token.cancelled() => break,
                }
            }
            info!("Statistics timer stopped");
        })
    }

    /// Stop intake, stop the consumer, stop timers, then close every client
    pub async fn shutdown(&self) -> ServiceStats {
        info!("Alarm service shutting down");

        if let Err(e) = self.bus.shutdown().await {
            error!("Alarm event bus shutdown: {}", e);
        }

        self.shutdown.cancel();
        let timers: Vec<JoinHandle<()>> = self.timers.lock().drain(..).collect();
        for timer in timers {
            if let Err(e) = timer.await {
                error!("Timer task ended abnormally: {}", e);
            }
        }

        self.registry
            .close_all(self.config.bus.shutdown_grace())
            .await;

        let stats = self.stats();
        info!(
            "Alarm service stopped: processed={} dropped={} errors={}",
            stats.bus.processed, stats.bus.dropped, stats.bus.errors
        );
        stats
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            bus: self.bus.stats(),
            pipeline: self.pipeline.stats(),
            connections: self.registry.len(),
            dedup_entries: self.dedup.len(),
        }
    }

    pub fn config(&self) -> &AlarmsrvConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ConditionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<PushConnectionRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<AlarmEventBus> {
        &self.bus
    }

    pub fn pipeline(&self) -> &Arc<AlarmPipeline> {
        &self.pipeline
    }

    pub fn keep_alive(&self) -> Duration {
        self.config.push.keep_alive()
    }
}
