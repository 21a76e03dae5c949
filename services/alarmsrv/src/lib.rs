//! Alarm Service Library
//!
//! Evaluates sensor readings against alarm conditions, records every
//! firing and pushes live alarm events to dashboard clients over SSE.
//!
//! ```text
//! ingest ─▶ AlarmPipeline ─▶ EventRecorder (always)
//!                 │
//!                 └─▶ NotificationDeduplicator ─▶ AlarmEventBus ─▶ PushConnectionRegistry ─▶ SSE
//! ```

pub mod api;
pub mod bus;
pub mod config;
pub mod dedup;
pub mod directory;
pub mod error;
pub mod pipeline;
pub mod recorder;
pub mod registry;
pub mod service;

pub use bus::{AlarmEventBus, Broadcaster, BusStats, DispatchReport};
pub use config::AlarmsrvConfig;
pub use dedup::NotificationDeduplicator;
pub use directory::{DeviceDirectory, StaticDeviceDirectory};
pub use error::{BusError, DispatchError, IngestSkip, RecorderError};
pub use pipeline::{AlarmPipeline, IngestOutcome, PipelineStats};
pub use recorder::{EventRecorder, MemoryEventRecorder, SqliteEventRecorder};
pub use registry::{ConnectionGuard, PushConnectionRegistry, PushMessage, Subscription};
pub use service::{AlarmService, ServiceStats};
