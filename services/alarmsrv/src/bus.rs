//! Alarm Event Bus
//!
//! Bounded FIFO between many producers and exactly one consumer. The
//! consumer serializes each event once and hands it to a `Broadcaster`
//! (the push registry in production).
//!
//! ```text
//!  publish() ──try_send──▶ [ bounded queue ] ──recv──▶ consumer ──▶ Broadcaster
//!      │ full: drop + count                              │
//!                                                         ├─ Err   → backoff, keep running
//!                                                         └─ panic → supervisor restarts
//!                                                                    queue + consumer
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fieldwatch_model::AlarmEvent;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BusSection;
use crate::error::{BusError, DispatchError};

/// Fan-out target of the consumer
pub trait Broadcaster: Send + Sync {
    /// Deliver one serialized event to every live connection
    fn broadcast(&self, payload: Arc<str>) -> Result<DispatchReport, DispatchError>;

    fn connection_count(&self) -> usize;
}

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: u64,
    /// Client went away; expected, not an error
    pub disconnected: u64,
    /// Any other send failure
    pub failed: u64,
}

#[derive(Debug, Default)]
struct BusCounters {
    published: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    disconnects: AtomicU64,
    restarts: AtomicU64,
    /// 1 while the consumer is inside a dispatch
    in_flight: AtomicU64,
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Every publish attempt, accepted or not
    pub published: u64,
    pub processed: u64,
    pub dropped: u64,
    pub errors: u64,
    pub disconnects: u64,
    pub restarts: u64,
}

/// Receiving half shared between the consumer and the supervisor, so the
/// supervisor can drain it after the consumer dies
type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<AlarmEvent>>>;

/// Bounded single-consumer broadcast queue
pub struct AlarmEventBus {
    settings: BusSection,
    sender: RwLock<mpsc::Sender<AlarmEvent>>,
    /// Receiver of the initial queue until `start` hands it to the consumer
    pending: Mutex<Option<mpsc::Receiver<AlarmEvent>>>,
    accepting: AtomicBool,
    counters: Arc<BusCounters>,
    broadcaster: Arc<dyn Broadcaster>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AlarmEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmEventBus")
            .field("capacity", &self.settings.capacity)
            .field("accepting", &self.accepting.load(Ordering::Relaxed))
            .field("stats", &self.stats())
            .finish()
    }
}

impl AlarmEventBus {
    /// Create the bus with its first queue; events published before
    /// `start` wait in that queue
    pub fn new(settings: BusSection, broadcaster: Arc<dyn Broadcaster>, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(settings.capacity.max(1));
        Self {
            settings,
            sender: RwLock::new(tx),
            pending: Mutex::new(Some(rx)),
            accepting: AtomicBool::new(true),
            counters: Arc::new(BusCounters::default()),
            broadcaster,
            cancel,
            supervisor: Mutex::new(None),
        }
    }

    /// Enqueue without waiting; returns false when the event was dropped
    pub fn publish(&self, event: AlarmEvent) -> bool {
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        if !self.accepting.load(Ordering::Acquire) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("Bus not accepting events, dropped alarm for {}", event.device_id);
            return false;
        }

        match self.sender.read().try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    "Alarm queue full, dropped event for {} (total dropped {})",
                    event.device_id, dropped
                );
                false
            },
            Err(TrySendError::Closed(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Alarm queue closed, dropped event for {}", event.device_id);
                false
            },
        }
    }

    /// Spawn the supervisor, which owns the consumer task
    pub fn start(self: &Arc<Self>) -> Result<(), BusError> {
        let Some(receiver) = self.pending.lock().take() else {
            return Err(BusError::AlreadyStarted);
        };

        let bus = Arc::clone(self);
        let queue = Arc::new(AsyncMutex::new(receiver));
        let handle = tokio::spawn(async move { bus.supervise(queue).await });
        *self.supervisor.lock() = Some(handle);
        info!("Alarm event bus started (capacity {})", self.settings.capacity);
        Ok(())
    }

    /// Restart loop around the consumer
    async fn supervise(self: Arc<Self>, mut queue: SharedReceiver) {
        loop {
            let mut consumer = tokio::spawn(consume(
                Arc::clone(&queue),
                Arc::clone(&self.broadcaster),
                Arc::clone(&self.counters),
                self.settings.clone(),
                self.cancel.clone(),
            ));

            let outcome = tokio::select! {
                outcome = &mut consumer => outcome,
                () = self.cancel.cancelled() => {
                    let grace = self.settings.shutdown_grace();
                    match tokio::time::timeout(grace, &mut consumer).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!("Alarm consumer did not stop within {:?}, aborting", grace);
                            consumer.abort();
                            // Aborting drops the consumer future and its queue lock
                            let _ = consumer.await;
                            self.discard_abandoned(&queue).await;
                            return;
                        },
                    }
                },
            };

            match outcome {
                Ok(()) => {
                    info!("Alarm consumer stopped");
                    return;
                },
                Err(e) if e.is_panic() => {
                    if self.cancel.is_cancelled() {
                        error!("Alarm consumer panicked during shutdown");
                        self.discard_abandoned(&queue).await;
                        return;
                    }
                    // Producers move to the fresh queue first; whatever still
                    // reaches the old one is drained and counted below
                    let (tx, rx) = mpsc::channel(self.settings.capacity.max(1));
                    *self.sender.write() = tx;
                    self.discard_abandoned(&queue).await;
                    queue = Arc::new(AsyncMutex::new(rx));
                    let restarts = self.counters.restarts.fetch_add(1, Ordering::Relaxed) + 1;
                    error!("Alarm consumer panicked, restarting (restart #{})", restarts);
                },
                Err(e) => {
                    warn!("Alarm consumer task ended: {}", e);
                    self.discard_abandoned(&queue).await;
                    return;
                },
            }
        }
    }

    /// Count the event a dead consumer was dispatching plus everything left
    /// in its queue as dropped
    async fn discard_abandoned(&self, queue: &SharedReceiver) {
        let interrupted = self.counters.in_flight.swap(0, Ordering::AcqRel);
        let leftover = drain_closed(&mut *queue.lock().await);
        let lost = interrupted + leftover;
        if lost > 0 {
            self.counters.dropped.fetch_add(lost, Ordering::Relaxed);
            warn!("Discarded {} alarm events abandoned by the consumer", lost);
        }
    }

    /// Stop accepting, stop the consumer and wait for it within the grace period
    pub async fn shutdown(&self) -> Result<BusStats, BusError> {
        self.accepting.store(false, Ordering::Release);
        self.cancel.cancel();

        let handle = self.supervisor.lock().take();
        if let Some(mut handle) = handle {
            // Supervisor enforces the grace on the consumer itself; this
            // bound only covers a wedged supervisor
            let limit = self.settings.shutdown_grace() + Duration::from_millis(500);
            if tokio::time::timeout(limit, &mut handle).await.is_err() {
                handle.abort();
                return Err(BusError::ShutdownTimeout(limit));
            }
        }

        let stats = self.stats();
        info!(
            "Alarm event bus stopped: processed={} dropped={} errors={}",
            stats.processed, stats.dropped, stats.errors
        );
        Ok(stats)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    pub fn stats(&self) -> BusStats {
        let c = &self.counters;
        BusStats {
            published: c.published.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            disconnects: c.disconnects.load(Ordering::Relaxed),
            restarts: c.restarts.load(Ordering::Relaxed),
        }
    }
}

/// Consumer loop: Running → Dispatching → Running, Backoff on dispatch
/// errors, Terminated on cancellation
async fn consume(
    queue: SharedReceiver,
    broadcaster: Arc<dyn Broadcaster>,
    counters: Arc<BusCounters>,
    settings: BusSection,
    cancel: CancellationToken,
) {
    let mut receiver = queue.lock().await;
    let poll_timeout = settings.poll_timeout();
    let mut failures: u32 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = tokio::time::timeout(poll_timeout, receiver.recv()) => next,
        };

        let event = match next {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("Alarm queue closed");
                break;
            },
            Err(_) => {
                failures = 0;
                continue;
            },
        };

        counters.in_flight.store(1, Ordering::Release);
        let result = dispatch(broadcaster.as_ref(), &event);
        counters.in_flight.store(0, Ordering::Release);

        match result {
            Ok(report) => {
                failures = 0;
                counters.processed.fetch_add(1, Ordering::Relaxed);
                counters.errors.fetch_add(report.failed, Ordering::Relaxed);
                counters
                    .disconnects
                    .fetch_add(report.disconnected, Ordering::Relaxed);
            },
            Err(e) => {
                counters.errors.fetch_add(1, Ordering::Relaxed);
                let delay = backoff_delay(settings.backoff_base(), settings.backoff_max(), failures);
                failures = failures.saturating_add(1);
                error!("Alarm dispatch failed: {}; backing off {:?}", e, delay);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {},
                }
            },
        }
    }

    let discarded = drain_closed(&mut receiver);
    if discarded > 0 {
        counters.dropped.fetch_add(discarded, Ordering::Relaxed);
        info!("Discarded {} queued alarm events on shutdown", discarded);
    }
}

/// Close the queue and count what was still in it
fn drain_closed(receiver: &mut mpsc::Receiver<AlarmEvent>) -> u64 {
    receiver.close();
    let mut discarded = 0u64;
    while receiver.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

fn dispatch(broadcaster: &dyn Broadcaster, event: &AlarmEvent) -> Result<DispatchReport, DispatchError> {
    let payload: Arc<str> = Arc::from(serde_json::to_string(event)?);
    let report = broadcaster.broadcast(payload)?;
    debug!(
        "Dispatched alarm {}/{} to {} clients",
        event.device_id, event.condition_id, report.delivered
    );
    Ok(report)
}

/// `base * 2^failures`, capped at `max`
pub fn backoff_delay(base: Duration, max: Duration, failures: u32) -> Duration {
    let factor = 1u32.checked_shl(failures.min(31)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(30);
        assert_eq!(backoff_delay(base, max, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, max, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, max, 4), Duration::from_millis(1_600));
        assert_eq!(backoff_delay(base, max, 9), max);
        assert_eq!(backoff_delay(base, max, u32::MAX), max);
    }
}
