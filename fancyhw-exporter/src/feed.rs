//! Subscriber side of the telemetry feed.
//!
//! [`ZmqSubscriber`] owns the ZeroMQ SUB socket, [`FeedDecoder`] pairs a
//! frame source with the [`FrameCodec`] that turns frames into samples.

use std::time::Duration;

use fancyhw_common::{DecodedFrame, FrameCodec};
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::error::BridgeError;

/// A blocking source of raw frames.
pub trait FrameSource: Send + 'static {
    /// Block until a frame arrives or the receive timeout elapses.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn receive_frame(&mut self) -> Result<Option<Vec<u8>>, BridgeError>;
}

/// ZeroMQ SUB socket subscribed to a single topic.
pub struct ZmqSubscriber {
    // Declared before the context so it is closed first.
    socket: zmq::Socket,
    _context: zmq::Context,
    endpoint: String,
}

impl ZmqSubscriber {
    /// Connect to the publisher and subscribe to the configured topic.
    pub fn connect(config: &FeedConfig) -> Result<Self, BridgeError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::SUB)?;

        // Do not hold the process open on pending messages at close.
        socket.set_linger(0)?;
        let timeout_ms = i32::try_from(config.receive_timeout_ms).map_err(|_| {
            BridgeError::Configuration(format!(
                "receive timeout too large: {}ms",
                config.receive_timeout_ms
            ))
        })?;
        socket.set_rcvtimeo(timeout_ms)?;

        socket.connect(&config.endpoint).map_err(|e| {
            BridgeError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
        })?;
        socket.set_subscribe(config.topic.as_bytes())?;

        info!(
            endpoint = %config.endpoint,
            topic = %config.topic,
            timeout_ms,
            "Subscribed to telemetry feed"
        );

        Ok(Self {
            socket,
            _context: context,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl FrameSource for ZmqSubscriber {
    fn receive_frame(&mut self) -> Result<Option<Vec<u8>>, BridgeError> {
        match self.socket.recv_bytes(0) {
            Ok(frame) => Ok(Some(frame)),
            Err(zmq::Error::EAGAIN) | Err(zmq::Error::EINTR) => Ok(None),
            Err(e) => Err(BridgeError::Connection(format!(
                "Receive from {} failed: {}",
                self.endpoint, e
            ))),
        }
    }
}

impl Drop for ZmqSubscriber {
    fn drop(&mut self) {
        info!(endpoint = %self.endpoint, "Closing subscriber socket");
    }
}

/// Receives frames from a source and decodes them.
pub struct FeedDecoder<S: FrameSource = ZmqSubscriber> {
    source: S,
    codec: FrameCodec,
    receive_timeout: Duration,
}

impl FeedDecoder<ZmqSubscriber> {
    /// Connect a ZeroMQ subscriber for the configured feed.
    ///
    /// Failure is returned to the caller; there is no retry here.
    pub fn connect(config: &FeedConfig) -> Result<Self, BridgeError> {
        let source = ZmqSubscriber::connect(config)?;
        let codec = FrameCodec::new(config.topic.clone()).with_byte_order(config.byte_order);
        Ok(Self::with_source(source, codec, config.receive_timeout()))
    }
}

impl<S: FrameSource> FeedDecoder<S> {
    pub fn with_source(source: S, codec: FrameCodec, receive_timeout: Duration) -> Self {
        Self {
            source,
            codec,
            receive_timeout,
        }
    }

    /// Block until the next frame arrives.
    pub fn receive_frame(&mut self) -> Result<Vec<u8>, BridgeError> {
        self.source
            .receive_frame()?
            .ok_or(BridgeError::Timeout(self.receive_timeout))
    }

    /// Decode a frame received from the feed.
    pub fn decode(&self, frame: &[u8]) -> Result<DecodedFrame, BridgeError> {
        let decoded = self.codec.decode(frame)?;

        debug!(
            topic = %decoded.topic,
            sample_count = decoded.sample_count(),
            samples = ?decoded.samples,
            "Decoded frame"
        );

        Ok(decoded)
    }
}
