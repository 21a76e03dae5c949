//! Common utilities shared by Fieldwatch services
//!
//! - `logging`: tracing subscriber setup (console + optional daily file)
//! - `service_bootstrap`: service metadata, banner and logging bootstrap
//! - `shutdown`: unified shutdown signal handling

pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use logging::{LogConfig, LoggingSection};
pub use service_bootstrap::ServiceInfo;
