//! Prometheus exporter for the fancyhw telemetry feed.
//!
//! This crate subscribes to a ZeroMQ publisher, decodes the 16-bit samples it
//! broadcasts and exposes them via an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  ZeroMQ feed    │────>│  MetricsBridge  │────>│   HTTP Server   │
//! │ (fancyhw_data)  │     │  (poll loop)    │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! POLLING_INTERVAL_SECONDS=5 fancyhw-exporter --config exporter.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod bridge;
pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod metrics;

pub use bridge::{BridgeState, BridgeStats, MetricsBridge, SharedStats};
pub use config::ExporterConfig;
pub use error::BridgeError;
pub use feed::{FeedDecoder, FrameSource, ZmqSubscriber};
pub use http::HttpServer;
pub use metrics::{HealthState, MetricSet, SharedMetrics};
