//! Unified service bootstrap utilities
//!
//! Startup banner, service metadata and logging initialization.

use crate::logging::{self, LogConfig, LoggingSection};
use tracing::info;

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "alarmsrv")
    pub name: String,
    /// Service version
    pub version: String,
    /// Service description
    pub description: String,
    /// Default port
    pub default_port: u16,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            default_port,
        }
    }
}

/// Print unified startup banner for any service
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = r#"
 ███████╗██╗███████╗██╗     ██████╗ ██╗    ██╗ █████╗ ████████╗ ██████╗██╗  ██╗
 ██╔════╝██║██╔════╝██║     ██╔══██╗██║    ██║██╔══██╗╚══██╔══╝██╔════╝██║  ██║
 █████╗  ██║█████╗  ██║     ██║  ██║██║ █╗ ██║███████║   ██║   ██║     ███████║
 ██╔══╝  ██║██╔══╝  ██║     ██║  ██║██║███╗██║██╔══██║   ██║   ██║     ██╔══██║
 ██║     ██║███████╗███████╗██████╔╝╚███╔███╔╝██║  ██║   ██║   ╚██████╗██║  ██║
 ╚═╝     ╚═╝╚══════╝╚══════╝╚═════╝  ╚══╝╚══╝ ╚═╝  ╚═╝   ╚═╝    ╚═════╝╚═╝  ╚═╝
    "#;

    info!("{}", banner);
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
}

/// Initialize logging for a service from its `logging` config section
///
/// Log directory priority:
/// 1. FIELDWATCH_LOG_DIR environment variable
/// 2. `section.dir`
/// 3. console only
pub fn init_logging(
    service: &ServiceInfo,
    section: &LoggingSection,
    ansi: bool,
) -> anyhow::Result<()> {
    let mut config = LogConfig::from_section(service.name.clone(), section);
    config.ansi = ansi;
    logging::init_with_config(config)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_service_info_creation() {
        let service = ServiceInfo::new("alarmsrv", "0.1.0", "Alarm Service", 6008);
        assert_eq!(service.name, "alarmsrv");
        assert_eq!(service.version, "0.1.0");
        assert_eq!(service.description, "Alarm Service");
        assert_eq!(service.default_port, 6008);
    }
}
