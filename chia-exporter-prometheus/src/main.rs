//! Prometheus exporter for Chia full node and harvester state.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{info, warn};

use chia_exporter_prometheus::{
    CollectionEngine, ExporterConfig, ExporterService, HttpServer, build_sources,
};

/// Prometheus exporter for Chia full node and harvester state.
#[derive(Parser, Debug)]
#[command(name = "chia-exporter-prometheus")]
#[command(about = "Export Chia netspace and plot sizes as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Collect netspace from the full node: `--collector.node`, `--collector.node false`
    /// or `--collector.node=false` (overrides config).
    #[arg(
        long = "collector.node",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    collector_node: Option<bool>,

    /// Collect plot sizes from the harvester: `--collector.harvester`,
    /// `--collector.harvester true` or `--collector.harvester=true` (overrides config).
    #[arg(
        long = "collector.harvester",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    collector_harvester: Option<bool>,

    /// HTTP listen port (overrides config, keeps the listen host).
    #[arg(long)]
    port: Option<u16>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Apply CLI overrides
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(port) = args.port {
        config.set_listen_port(port)?;
    }
    if let Some(enabled) = args.collector_node {
        config.collectors.node.enabled = enabled;
    }
    if let Some(enabled) = args.collector_harvester {
        config.collectors.harvester.enabled = enabled;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    chia_common::init_tracing(&config.logging)?;

    info!("Starting Chia Prometheus Exporter");

    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let sources = build_sources(&config);
    if sources.is_empty() {
        warn!("No collectors enabled, only exporter metrics will be served");
    }

    let engine = CollectionEngine::new(sources, config.scrape_timeout());
    let service = Arc::new(ExporterService::new(engine, Handle::current()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        service.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    // Wait for shutdown signal, or for the server to fail on its own
    tokio::select! {
        result = &mut http_task => {
            result??;
            return Ok(());
        }
        signal = shutdown_signal() => {
            signal?;
        }
    }

    shutdown_tx.send(true)?;

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(result) => result??,
        Err(_) => warn!("HTTP server did not stop in time"),
    }

    let stats = service.stats();
    info!(
        scrapes = stats.scrapes,
        node_failures = stats.failures_for(chia_common::SourceKind::Node),
        harvester_failures = stats.failures_for(chia_common::SourceKind::Harvester),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}
