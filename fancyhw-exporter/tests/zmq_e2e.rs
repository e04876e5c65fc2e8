//! End-to-end tests over a real ZeroMQ PUB/SUB pair.
//!
//! The publisher binds an ephemeral loopback port and keeps sending until the
//! subscriber has joined, since PUB drops frames for peers still connecting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use fancyhw_common::{ByteOrder, Sample, encode_frame};
use fancyhw_exporter::config::{FeedConfig, PlaceholderValues};
use fancyhw_exporter::{BridgeError, FeedDecoder, MetricSet, MetricsBridge};

/// Publish `frames` round-robin on a fresh endpoint until `stop` is set.
fn spawn_publisher(frames: Vec<Vec<u8>>, stop: Arc<AtomicBool>) -> String {
    let context = zmq::Context::new();
    let socket = context.socket(zmq::PUB).unwrap();
    socket.bind("tcp://127.0.0.1:*").unwrap();
    let endpoint = socket.get_last_endpoint().unwrap().unwrap();

    thread::spawn(move || {
        let _context = context;
        for frame in frames.iter().cycle() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            socket.send(frame.as_slice(), 0).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
    });

    endpoint
}

fn feed_config(endpoint: String) -> FeedConfig {
    FeedConfig {
        endpoint,
        receive_timeout_ms: 200,
        ..FeedConfig::default()
    }
}

#[test]
fn test_subscriber_filters_by_topic() {
    let stop = Arc::new(AtomicBool::new(false));
    let endpoint = spawn_publisher(
        vec![
            encode_frame("other_topic", &[Sample::new(1)], ByteOrder::Native),
            encode_frame("fancyhw_data", &[Sample::new(42)], ByteOrder::Native),
        ],
        stop.clone(),
    );

    let mut decoder = FeedDecoder::connect(&feed_config(endpoint)).unwrap();

    let mut received = Vec::new();
    for _ in 0..50 {
        match decoder.receive_frame() {
            Ok(frame) => {
                received.push(decoder.decode(&frame).unwrap());
                if received.len() == 3 {
                    break;
                }
            }
            Err(BridgeError::Timeout(_)) => continue,
            Err(e) => panic!("unexpected receive error: {}", e),
        }
    }
    stop.store(true, Ordering::Relaxed);

    assert_eq!(received.len(), 3, "subscriber never joined the publisher");
    for frame in received {
        assert_eq!(frame.topic, "fancyhw_data");
        assert_eq!(frame.single(), Ok(Sample::new(42)));
    }
}

#[tokio::test]
async fn test_bridge_over_zeromq() {
    let stop = Arc::new(AtomicBool::new(false));
    let endpoint = spawn_publisher(
        vec![encode_frame(
            "fancyhw_data",
            &[Sample::new(77)],
            ByteOrder::Native,
        )],
        stop.clone(),
    );

    let decoder = FeedDecoder::connect(&feed_config(endpoint)).unwrap();
    let metrics = Arc::new(MetricSet::new(PlaceholderValues::default()));
    let mut bridge = MetricsBridge::new(decoder, metrics.clone(), Duration::from_millis(1)).unwrap();

    let mut applied = false;
    for _ in 0..50 {
        match bridge.poll_once().await {
            Ok(_) => {
                applied = true;
                break;
            }
            Err(e) => assert!(e.is_recoverable(), "unexpected error: {}", e),
        }
    }
    stop.store(true, Ordering::Relaxed);
    bridge.shutdown();

    assert!(applied, "no frame reached the bridge");
    assert_eq!(metrics.gpu_utilization(), 77);
}
