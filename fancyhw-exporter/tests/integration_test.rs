//! Integration tests for the exporter.
//!
//! These tests drive the bridge with scripted frames and read the result back
//! through the HTTP metrics endpoint.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use fancyhw_common::{ByteOrder, FrameCodec, Sample};
use fancyhw_exporter::config::PlaceholderValues;
use fancyhw_exporter::{
    BridgeError, BridgeState, FeedDecoder, FrameSource, HealthState, HttpServer, MetricSet,
    MetricsBridge,
};
use tokio::sync::watch;

/// Frame source replaying a fixed script, then failing like a lost socket.
struct ScriptedFeed(VecDeque<Option<Vec<u8>>>);

impl FrameSource for ScriptedFeed {
    fn receive_frame(&mut self) -> Result<Option<Vec<u8>>, BridgeError> {
        self.0
            .pop_front()
            .ok_or_else(|| BridgeError::Connection("feed closed".to_string()))
    }
}

fn make_bridge(frames: Vec<Option<Vec<u8>>>) -> MetricsBridge<ScriptedFeed> {
    let decoder = FeedDecoder::with_source(
        ScriptedFeed(frames.into()),
        FrameCodec::new("fancyhw_data").with_byte_order(ByteOrder::Little),
        Duration::from_millis(10),
    );
    let metrics = Arc::new(MetricSet::new(PlaceholderValues::default()));
    MetricsBridge::new(decoder, metrics, Duration::from_millis(1)).unwrap()
}

/// Helper to extract the value of an unlabelled series from exposition text.
fn series_value(body: &str, name: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (metric, value) = line.split_once(' ')?;
            if metric == name {
                value.parse().ok()
            } else {
                None
            }
        })
}

#[tokio::test]
async fn test_scenarios_through_run_loop() {
    let mut bridge = make_bridge(vec![
        // A: one sample, value 42
        Some(b"fancyhw_data \x2A\x00".to_vec()),
        // B: two samples
        Some(b"fancyhw_data \x00\x00\x01\x00".to_vec()),
        // C: foreign topic
        Some(b"other_topic \x01\x00".to_vec()),
        // odd payload
        Some(b"fancyhw_data \x01".to_vec()),
        // receive timeout
        None,
    ]);
    let (_tx, rx) = watch::channel(false);

    let result = bridge.run(rx).await;
    assert!(matches!(result, Err(BridgeError::Connection(_))));
    assert_eq!(bridge.state(), BridgeState::Closed);

    let metrics = bridge.metrics();
    assert_eq!(metrics.gpu_utilization(), 42);
    assert_eq!(metrics.requests_pending(), 51);
    assert_eq!(metrics.uptime(), 512);
    assert_eq!(metrics.health(), HealthState::Healthy);

    let stats = bridge.stats().read().clone();
    assert_eq!(stats.frames_received, 4);
    assert_eq!(stats.cycles_applied, 1);
    assert_eq!(stats.protocol_anomalies, 1);
    assert_eq!(stats.decode_errors, 2);
    assert_eq!(stats.receive_timeouts, 1);
}

#[tokio::test]
async fn test_latest_sample_wins() {
    let codec = FrameCodec::new("fancyhw_data").with_byte_order(ByteOrder::Little);
    let frames = [10, -20, 30]
        .into_iter()
        .map(|v| Some(codec.encode(&[Sample::new(v)])))
        .collect();
    let mut bridge = make_bridge(frames);

    for _ in 0..3 {
        bridge.poll_once().await.unwrap();
    }

    assert_eq!(bridge.metrics().gpu_utilization(), 30);
    assert_eq!(bridge.stats().read().last_sample, Some(30));
}

#[tokio::test]
async fn test_http_server_serves_last_good_values() {
    let mut bridge = make_bridge(vec![
        Some(b"fancyhw_data \x2A\x00".to_vec()),
        Some(b"other_topic \x01\x00".to_vec()),
    ]);
    bridge.poll_once().await.unwrap();
    bridge.poll_once().await.unwrap_err();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = HttpServer::new(
        bridge.metrics().clone(),
        bridge.stats(),
        addr,
        "/metrics".to_string(),
    );
    let server_handle = tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

    let client = reqwest::Client::new();
    let body = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let ready = client
        .get(format!("http://{}/ready", addr))
        .send()
        .await
        .unwrap();
    assert!(ready.status().is_success());

    shutdown_tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(1), server_handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());

    assert_eq!(series_value(&body, "gpu_utilization"), Some(42.0));
    assert_eq!(series_value(&body, "app_requests_pending"), Some(51.0));
    assert_eq!(series_value(&body, "app_uptime"), Some(512.0));
    assert!(body.contains(r#"app_health{app_health="healthy"} 1"#));
    assert!(body.contains(r#"app_health{app_health="unhealthy"} 0"#));
}

#[tokio::test]
async fn test_http_server_bind_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let bridge = make_bridge(vec![]);
    let server = HttpServer::new(
        bridge.metrics().clone(),
        bridge.stats(),
        addr,
        "/metrics".to_string(),
    );
    let (_tx, rx) = watch::channel(false);

    // The port is still held by `listener`.
    let result = server.run(rx).await;
    assert!(result.unwrap_err().to_string().contains("Failed to bind"));
    drop(listener);
}
