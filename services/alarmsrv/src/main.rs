//! Alarm Service (AlarmSrv)
//!
//! Alarm condition evaluation and live push notification service.

use std::net::SocketAddr;
use std::path::PathBuf;

use alarmsrv::api::create_router;
use alarmsrv::config::{AlarmsrvConfig, DEFAULT_PORT};
use alarmsrv::AlarmService;
use anyhow::Context;
use clap::Parser;
use common::service_bootstrap::{init_logging, print_startup_banner, ServiceInfo};
use common::shutdown::cancel_on_shutdown;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "alarmsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Fieldwatch alarm evaluation and push service",
    long_about = None
)]
struct Args {
    /// Configuration file (defaults to config/alarmsrv.yaml)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Validation mode - load and validate configuration, print it, then exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AlarmsrvConfig::load(args.config.as_deref())?;

    let service_info = ServiceInfo::new(
        "alarmsrv",
        env!("CARGO_PKG_VERSION"),
        "Alarm Evaluation and Live Push Service",
        DEFAULT_PORT,
    );
    init_logging(&service_info, &config.logging, !args.no_color)?;
    if !args.no_color {
        print_startup_banner(&service_info);
    }

    if args.validate {
        config.validate()?;
        println!("{}", serde_yaml::to_string(&config)?);
        info!("Validation completed successfully");
        return Ok(());
    }

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address '{}:{}'",
                config.api.host, config.api.port
            )
        })?;

    let service = AlarmService::start(config).await?;
    let app = create_router(service.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("API server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    // Cancelled by Ctrl+C / SIGTERM, or by the server task failing
    let stop = CancellationToken::new();
    let _signal_watcher = cancel_on_shutdown(stop.clone());

    let server_token = CancellationToken::new();
    let server_shutdown = server_token.clone();
    let server_failed = stop.clone();
    let server_handle = tokio::spawn(async move {
        let shutdown = async move { server_shutdown.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Server error: {}", e);
            server_failed.cancel();
        }
    });

    stop.cancelled().await;

    // Close push streams first so the server's graceful shutdown is not
    // held open by long-lived SSE responses
    service.shutdown().await;
    server_token.cancel();
    if let Err(e) = server_handle.await {
        error!("Server task ended abnormally: {}", e);
    }

    info!("AlarmSrv stopped");
    Ok(())
}
