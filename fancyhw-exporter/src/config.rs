//! Configuration for the fancyhw exporter.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use fancyhw_common::{ByteOrder, LoggingConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Telemetry feed subscription.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Poll loop cadence.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Upstream application settings.
    #[serde(default)]
    pub app: AppConfig,

    /// Prometheus HTTP endpoint.
    #[serde(default)]
    pub exporter: HttpConfig,

    /// Values for series that have no source field yet.
    #[serde(default)]
    pub placeholders: PlaceholderValues,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// ZeroMQ subscriber configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Publisher endpoint (default: "tcp://127.0.0.1:5555").
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Subscription topic, ASCII (default: "fancyhw_data").
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Upper bound on a single blocking receive, in milliseconds.
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,

    /// Byte order of the 16-bit samples.
    #[serde(default)]
    pub byte_order: ByteOrder,
}

fn default_endpoint() -> String {
    "tcp://127.0.0.1:5555".to_string()
}

fn default_topic() -> String {
    "fancyhw_data".to_string()
}

fn default_receive_timeout() -> u64 {
    1000
}

impl FeedConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            topic: default_topic(),
            receive_timeout_ms: default_receive_timeout(),
            byte_order: ByteOrder::default(),
        }
    }
}

/// Poll loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Sleep between poll cycles (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_interval() -> u64 {
    1
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

/// Upstream application configuration.
///
/// The status API on this port is not queried yet; the setting is carried so
/// deployments keep a stable configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_port")]
    pub port: u16,
}

fn default_app_port() -> u16 {
    80
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_app_port(),
        }
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to bind (default: "0.0.0.0").
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Port to listen on (default: 9877).
    #[serde(default = "default_exporter_port")]
    pub port: u16,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_exporter_port() -> u16 {
    9877
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl HttpConfig {
    /// Socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.listen_host.parse().map_err(|_| {
            ConfigError::Validation(format!("Invalid listen host: {}", self.listen_host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            port: default_exporter_port(),
            path: default_path(),
        }
    }
}

/// Values published for `app_requests_pending` and `app_uptime`.
///
/// The telemetry frame does not carry these fields yet, so each good cycle
/// writes these fixed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderValues {
    #[serde(default = "default_requests_pending")]
    pub requests_pending: i64,

    #[serde(default = "default_uptime")]
    pub uptime: i64,
}

fn default_requests_pending() -> i64 {
    51
}

fn default_uptime() -> i64 {
    512
}

impl Default for PlaceholderValues {
    fn default() -> Self {
        Self {
            requests_pending: default_requests_pending(),
            uptime: default_uptime(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "feed endpoint must not be empty".to_string(),
            ));
        }

        if self.feed.topic.is_empty() {
            return Err(ConfigError::Validation(
                "feed topic must not be empty".to_string(),
            ));
        }

        // The topic is terminated by the first space on the wire.
        if !self.feed.topic.is_ascii() || self.feed.topic.contains(' ') {
            return Err(ConfigError::Validation(format!(
                "feed topic must be ASCII without spaces: {:?}",
                self.feed.topic
            )));
        }

        if self.feed.receive_timeout_ms == 0 || self.feed.receive_timeout_ms > i32::MAX as u64 {
            return Err(ConfigError::Validation(format!(
                "receive_timeout_ms must be between 1 and {}",
                i32::MAX
            )));
        }

        if self.polling.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "interval_secs must be > 0".to_string(),
            ));
        }

        if self.app.port == 0 {
            return Err(ConfigError::Validation("app port must be > 0".to_string()));
        }

        if self.exporter.port == 0 {
            return Err(ConfigError::Validation(
                "exporter port must be > 0".to_string(),
            ));
        }

        self.exporter.listen_addr()?;

        // Validate path starts with /
        if !self.exporter.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        Ok(())
    }
}
