//! Poll loop keeping the metric set in sync with the telemetry feed.

use std::sync::Arc;
use std::time::Duration;

use fancyhw_common::Sample;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;
use crate::feed::{FeedDecoder, FrameSource, ZmqSubscriber};
use crate::metrics::SharedMetrics;

/// Lifecycle of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Socket established, loop runnable.
    Connected,
    /// Socket released. Terminal.
    Closed,
}

/// Bridge statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BridgeStats {
    /// Frames received from the feed.
    pub frames_received: u64,
    /// Cycles that updated the metric set.
    pub cycles_applied: u64,
    /// Frames rejected by the codec.
    pub decode_errors: u64,
    /// Frames with a sample count other than one.
    pub protocol_anomalies: u64,
    /// Receives that timed out without a frame.
    pub receive_timeouts: u64,
    /// Value of the last applied sample.
    pub last_sample: Option<i16>,
    /// Wall-clock time of the last applied cycle (Unix milliseconds).
    pub last_success_ms: Option<i64>,
}

/// Shareable statistics handle.
pub type SharedStats = Arc<RwLock<BridgeStats>>;

/// Drives receive, decode, update and sleep on a fixed cadence.
pub struct MetricsBridge<S: FrameSource = ZmqSubscriber> {
    decoder: Option<FeedDecoder<S>>,
    metrics: SharedMetrics,
    stats: SharedStats,
    interval: Duration,
    state: BridgeState,
}

impl<S: FrameSource> MetricsBridge<S> {
    /// Create a bridge over a connected decoder.
    ///
    /// The poll interval must be positive.
    pub fn new(
        decoder: FeedDecoder<S>,
        metrics: SharedMetrics,
        interval: Duration,
    ) -> Result<Self, BridgeError> {
        if interval.is_zero() {
            return Err(BridgeError::Configuration(
                "poll interval must be > 0".to_string(),
            ));
        }

        Ok(Self {
            decoder: Some(decoder),
            metrics,
            stats: Arc::new(RwLock::new(BridgeStats::default())),
            interval,
            state: BridgeState::Connected,
        })
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Handle to the statistics, for the HTTP server.
    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Run poll cycles until shutdown is signalled or the feed is lost.
    ///
    /// The socket is released on every exit path.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), BridgeError> {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Starting poll loop"
        );

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            match self.poll_once().await {
                Ok(sample) => {
                    debug!(value = sample.value(), "Metrics updated");
                }
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Poll cycle skipped");
                }
                Err(e) => {
                    error!(error = %e, "Telemetry feed lost");
                    break Err(e);
                }
            }

            let stop = tokio::select! {
                _ = tokio::time::sleep(self.interval) => false,
                changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
            };
            if stop {
                break Ok(());
            }
        };

        self.shutdown();
        result
    }

    /// Perform a single poll cycle.
    ///
    /// On error the metric set is left untouched.
    pub async fn poll_once(&mut self) -> Result<Sample, BridgeError> {
        let mut decoder = self
            .decoder
            .take()
            .ok_or_else(|| BridgeError::Connection("subscriber socket is closed".to_string()))?;

        // The receive blocks on the socket, so run it off the async workers.
        let (decoder, received) = match tokio::task::spawn_blocking(move || {
            let received = decoder.receive_frame();
            (decoder, received)
        })
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                self.state = BridgeState::Closed;
                return Err(BridgeError::Connection(format!(
                    "Receive task failed: {}",
                    e
                )));
            }
        };

        let result = received.and_then(|frame| {
            self.stats.write().frames_received += 1;
            let decoded = decoder.decode(&frame)?;
            Ok(decoded.single()?)
        });
        self.decoder = Some(decoder);

        self.record(&result);
        result
    }

    fn record(&self, result: &Result<Sample, BridgeError>) {
        let mut stats = self.stats.write();
        match result {
            Ok(sample) => {
                self.metrics.apply(*sample);
                stats.cycles_applied += 1;
                stats.last_sample = Some(sample.value());
                stats.last_success_ms = Some(chrono::Utc::now().timestamp_millis());
            }
            Err(BridgeError::Timeout(_)) => stats.receive_timeouts += 1,
            Err(BridgeError::Decode(_)) => stats.decode_errors += 1,
            Err(BridgeError::ProtocolAnomaly(_)) => stats.protocol_anomalies += 1,
            Err(_) => {}
        }
    }

    /// Release the subscriber socket. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.decoder.take().is_some() {
            info!("Subscriber released");
        }
        self.state = BridgeState::Closed;
    }
}
