//! Unified logging module for Fieldwatch services
//!
//! Console output always uses the bracketed level format. A daily rolling
//! file layer is added when a log directory is configured.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Service started`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the non-blocking file writer alive for the process lifetime
static FILE_GUARD: OnceLock<Mutex<Option<WorkerGuard>>> = OnceLock::new();

/// `logging` section of a service configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter when `RUST_LOG` is unset (e.g. "info")
    pub level: String,
    /// Directory for daily log files; `None` disables file output
    pub dir: Option<String>,
    /// Write the file layer as JSON lines
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

/// Resolved logging configuration for one service
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, also used as the log file prefix
    pub service_name: String,
    /// Base filter used when `RUST_LOG` is not set
    pub level: String,
    /// Directory for daily rolling files
    pub log_dir: Option<PathBuf>,
    /// JSON format for the file layer
    pub enable_json: bool,
    /// ANSI colours on the console layer
    pub ansi: bool,
}

impl LogConfig {
    pub fn from_section(service_name: impl Into<String>, section: &LoggingSection) -> Self {
        let log_dir = std::env::var("FIELDWATCH_LOG_DIR")
            .ok()
            .or_else(|| section.dir.clone())
            .map(PathBuf::from);

        Self {
            service_name: service_name.into(),
            level: section.level.clone(),
            log_dir,
            enable_json: section.json,
            ansi: true,
        }
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> String {
        format!("{},{}=debug", self.level, self.service_name)
    }
}

/// Build the env filter: `RUST_LOG` wins over the configured level
fn build_filter(config: &LogConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.is_empty() => EnvFilter::new(env_str),
        _ => EnvFilter::new(config.default_directive()),
    }
}

/// Initialize the global tracing subscriber
///
/// Safe to call once per process; a second call returns an error from
/// `try_init` which callers may ignore in tests.
pub fn init_with_config(config: LogConfig) -> anyhow::Result<()> {
    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let slot = FILE_GUARD.get_or_init(|| Mutex::new(None));
            match slot.lock() {
                Ok(mut slot) => *slot = Some(guard),
                Err(poisoned) => *poisoned.into_inner() = Some(guard),
            }

            let layer = if config.enable_json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_thread_ids(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed()
            };
            Some(layer)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(&config))
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    match &config.log_dir {
        Some(dir) => tracing::info!("Logging: {} @ {:?}", config.service_name, dir),
        None => tracing::info!("Logging: {} (console only)", config.service_name),
    }

    Ok(())
}
