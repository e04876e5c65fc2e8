//! Codec for the fancyhw telemetry frame.
//!
//! A frame on the wire is `<topic> 0x20 <payload>`, where the payload is a
//! tightly packed run of signed 16-bit samples. The current protocol version
//! carries exactly one sample per frame; see [`DecodedFrame::single`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Byte separating the topic from the payload.
pub const TOPIC_SEPARATOR: u8 = b' ';

/// Width of one encoded sample in bytes.
pub const SAMPLE_WIDTH: usize = std::mem::size_of::<i16>();

/// A single decoded telemetry reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample(i16);

impl Sample {
    pub fn new(value: i16) -> Self {
        Self(value)
    }

    pub fn value(self) -> i16 {
        self.0
    }
}

impl From<i16> for Sample {
    fn from(value: i16) -> Self {
        Self(value)
    }
}

impl From<Sample> for i64 {
    fn from(sample: Sample) -> Self {
        i64::from(sample.0)
    }
}

impl From<Sample> for f64 {
    fn from(sample: Sample) -> Self {
        f64::from(sample.0)
    }
}

impl std::fmt::Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte order of the samples in the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Byte order of the host, matching a publisher on the same machine.
    #[default]
    Native,
    Little,
    Big,
}

impl ByteOrder {
    fn read(self, bytes: [u8; SAMPLE_WIDTH]) -> i16 {
        match self {
            ByteOrder::Native => i16::from_ne_bytes(bytes),
            ByteOrder::Little => i16::from_le_bytes(bytes),
            ByteOrder::Big => i16::from_be_bytes(bytes),
        }
    }

    fn write(self, value: i16) -> [u8; SAMPLE_WIDTH] {
        match self {
            ByteOrder::Native => value.to_ne_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

/// Reasons a frame cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Frame has no topic separator")]
    MissingSeparator,

    #[error("Topic is not valid ASCII")]
    NonAsciiTopic,

    #[error("Topic mismatch: expected '{expected}', got '{actual}'")]
    TopicMismatch { expected: String, actual: String },

    #[error("Payload length {0} is not a multiple of the 2-byte sample width")]
    OddPayloadLength(usize),
}

/// A decoded frame carried a sample count the protocol does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Expected exactly 1 sample per frame, got {sample_count}")]
pub struct ProtocolAnomaly {
    pub sample_count: usize,
}

/// The result of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub topic: String,
    pub samples: Vec<Sample>,
}

impl DecodedFrame {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Return the only sample of the frame.
    ///
    /// Frames with zero or several samples are reported as an anomaly rather
    /// than truncated to their first element.
    pub fn single(&self) -> Result<Sample, ProtocolAnomaly> {
        match self.samples.as_slice() {
            [sample] => Ok(*sample),
            samples => Err(ProtocolAnomaly {
                sample_count: samples.len(),
            }),
        }
    }
}

/// Decoder for frames published on one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCodec {
    topic: String,
    byte_order: ByteOrder,
}

impl FrameCodec {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            byte_order: ByteOrder::default(),
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Decode a raw frame into its topic and samples.
    ///
    /// The frame is split on the first space only, so the payload may
    /// contain `0x20` bytes.
    pub fn decode(&self, frame: &[u8]) -> Result<DecodedFrame, DecodeError> {
        let split = frame
            .iter()
            .position(|&b| b == TOPIC_SEPARATOR)
            .ok_or(DecodeError::MissingSeparator)?;
        let (topic_bytes, rest) = frame.split_at(split);
        let payload = &rest[1..];

        if !topic_bytes.is_ascii() {
            return Err(DecodeError::NonAsciiTopic);
        }
        // ASCII is a subset of UTF-8.
        let topic = String::from_utf8_lossy(topic_bytes).into_owned();

        if topic != self.topic {
            return Err(DecodeError::TopicMismatch {
                expected: self.topic.clone(),
                actual: topic,
            });
        }

        if payload.len() % SAMPLE_WIDTH != 0 {
            return Err(DecodeError::OddPayloadLength(payload.len()));
        }

        let samples = payload
            .chunks_exact(SAMPLE_WIDTH)
            .map(|chunk| Sample(self.byte_order.read([chunk[0], chunk[1]])))
            .collect();

        Ok(DecodedFrame { topic, samples })
    }

    /// Build a frame for this codec's topic.
    pub fn encode(&self, samples: &[Sample]) -> Vec<u8> {
        encode_frame(&self.topic, samples, self.byte_order)
    }
}

/// Build a frame from a topic and samples.
pub fn encode_frame(topic: &str, samples: &[Sample], byte_order: ByteOrder) -> Vec<u8> {
    let mut frame = Vec::with_capacity(topic.len() + 1 + samples.len() * SAMPLE_WIDTH);
    frame.extend_from_slice(topic.as_bytes());
    frame.push(TOPIC_SEPARATOR);
    for sample in samples {
        frame.extend_from_slice(&byte_order.write(sample.value()));
    }
    frame
}
