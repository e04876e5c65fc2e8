//! Demo publisher for the fancyhw telemetry feed.
//!
//! Binds a ZeroMQ PUB socket and broadcasts one single-sample frame per
//! interval, so the exporter can be exercised without the hardware.

use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use fancyhw_common::{ByteOrder, FrameCodec, LoggingConfig, Sample};

/// Publishes synthetic fancyhw telemetry.
#[derive(Parser, Debug)]
#[command(name = "fancyhw-publisher")]
#[command(about = "Publish synthetic fancyhw telemetry over ZeroMQ")]
#[command(version)]
struct Args {
    /// Endpoint to bind.
    #[arg(long, env = "FEED_ENDPOINT", default_value = "tcp://127.0.0.1:5555")]
    endpoint: String,

    /// Topic to publish on.
    #[arg(long, env = "FEED_TOPIC", default_value = "fancyhw_data")]
    topic: String,

    /// Milliseconds between frames.
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Publish this value on every frame instead of a 0..=100 ramp.
    #[arg(long, allow_hyphen_values = true)]
    value: Option<i16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    fancyhw_common::init_tracing(&LoggingConfig {
        level: args.log_level.clone(),
        ..LoggingConfig::default()
    })
    .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    let context = zmq::Context::new();
    let socket = context.socket(zmq::PUB)?;
    socket
        .bind(&args.endpoint)
        .with_context(|| format!("Failed to bind {}", args.endpoint))?;

    let codec = FrameCodec::new(args.topic.clone()).with_byte_order(ByteOrder::Native);
    info!(endpoint = %args.endpoint, topic = %args.topic, "Publishing telemetry");

    let interval = Duration::from_millis(args.interval_ms);
    for tick in 0u64.. {
        let value = args.value.unwrap_or((tick % 101) as i16);
        let frame = codec.encode(&[Sample::new(value)]);
        socket.send(frame, 0)?;
        debug!(value, "Published frame");
        thread::sleep(interval);
    }

    Ok(())
}
