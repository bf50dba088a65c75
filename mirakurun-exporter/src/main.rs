//! Prometheus exporter for Mirakurun.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use mirakurun_common::{ApiClient, EndpointConfig, init_tracing};
use mirakurun_exporter::http::join_with_grace;
use mirakurun_exporter::{ExporterConfig, HttpServer, default_registry};

/// How long to wait for in-flight scrapes after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Prometheus exporter for Mirakurun.
#[derive(Parser, Debug)]
#[command(name = "mirakurun-exporter")]
#[command(about = "Export Mirakurun status as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    info!("Starting Mirakurun Exporter");

    let endpoint = EndpointConfig::from_env()?;
    info!(upstream = %endpoint, "Resolved Mirakurun endpoint");

    let client = ApiClient::new(endpoint, config.upstream.timeout())?;
    let registry = Arc::new(default_registry(&client)?);

    let listen_addr = config
        .server
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(registry, listen_addr, config.server.path.clone());
    let mut http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = &mut http_task => {
            anyhow::bail!("HTTP server exited unexpectedly");
        }
    }

    shutdown_tx.send(true)?;

    join_with_grace(http_task, SHUTDOWN_GRACE).await;

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
