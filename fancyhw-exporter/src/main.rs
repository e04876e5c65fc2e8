//! Prometheus exporter for the fancyhw telemetry feed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use fancyhw_exporter::{ExporterConfig, FeedDecoder, HttpServer, MetricSet, MetricsBridge};

/// Prometheus exporter for the fancyhw telemetry feed.
#[derive(Parser, Debug)]
#[command(name = "fancyhw-exporter")]
#[command(about = "Export the fancyhw ZeroMQ feed as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, env = "EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Publisher endpoint (overrides config).
    #[arg(long, env = "FEED_ENDPOINT")]
    endpoint: Option<String>,

    /// Subscription topic (overrides config).
    #[arg(long, env = "FEED_TOPIC")]
    topic: Option<String>,

    /// Receive timeout in milliseconds (overrides config).
    #[arg(long, env = "RECEIVE_TIMEOUT_MS")]
    receive_timeout_ms: Option<u64>,

    /// Seconds between poll cycles (overrides config).
    #[arg(long, env = "POLLING_INTERVAL_SECONDS")]
    polling_interval_seconds: Option<u64>,

    /// Upstream application port (overrides config).
    #[arg(long, env = "APP_PORT")]
    app_port: Option<u16>,

    /// Metrics HTTP port (overrides config).
    #[arg(long, env = "EXPORTER_PORT")]
    exporter_port: Option<u16>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut ExporterConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.feed.endpoint = endpoint.clone();
        }
        if let Some(topic) = &self.topic {
            config.feed.topic = topic.clone();
        }
        if let Some(timeout) = self.receive_timeout_ms {
            config.feed.receive_timeout_ms = timeout;
        }
        if let Some(interval) = self.polling_interval_seconds {
            config.polling.interval_secs = interval;
        }
        if let Some(port) = self.app_port {
            config.app.port = port;
        }
        if let Some(port) = self.exporter_port {
            config.exporter.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ExporterConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    fancyhw_common::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting fancyhw exporter");
    info!(topic = %config.feed.topic, "Reading messages");

    let listen_addr = config.exporter.listen_addr()?;

    // Connect the subscriber
    let decoder = FeedDecoder::connect(&config.feed).context("Failed to connect to the feed")?;

    let metrics = Arc::new(MetricSet::new(config.placeholders));
    let mut bridge = MetricsBridge::new(decoder, metrics.clone(), config.polling.interval())?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        metrics,
        bridge.stats(),
        listen_addr,
        config.exporter.path.clone(),
    );
    let stats = bridge.stats();

    // Bind before spawning so an unusable port stops startup
    let listener = http_server
        .bind()
        .await
        .context("Failed to start metrics endpoint")?;

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let mut http_task = tokio::spawn(http_server.serve(listener, http_shutdown));

    // Start the poll loop
    let bridge_shutdown = shutdown_rx.clone();
    let mut bridge_task = tokio::spawn(async move { bridge.run(bridge_shutdown).await });

    // Wait for a shutdown signal, or for the feed or HTTP server to fail
    let mut bridge_result = None;
    let mut http_result = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut bridge_task => {
            bridge_result = Some(result);
        }
        result = &mut http_task => {
            http_result = Some(result);
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        if bridge_result.is_none() {
            bridge_result = Some(bridge_task.await);
        }
        if http_result.is_none() {
            http_result = Some(http_task.await);
        }
    })
    .await;

    // Print final stats
    let stats = stats.read().clone();
    info!(
        frames_received = stats.frames_received,
        cycles_applied = stats.cycles_applied,
        decode_errors = stats.decode_errors,
        protocol_anomalies = stats.protocol_anomalies,
        receive_timeouts = stats.receive_timeouts,
        "Final statistics"
    );

    match http_result {
        Some(Ok(Err(e))) => return Err(e.context("HTTP server failed")),
        Some(Err(e)) => return Err(e).context("HTTP server task panicked"),
        _ => {}
    }

    match bridge_result {
        Some(Ok(Err(e))) => Err(e).context("Poll loop failed"),
        Some(Err(e)) => Err(e).context("Poll loop task panicked"),
        _ => {
            info!("Exporter stopped");
            Ok(())
        }
    }
}

async fn terminate() {
    #[cfg(unix)]
    {
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
    {
        std::future::pending::<()>().await;
    }
}
