//! fancyhw common library
//!
//! Shared pieces of the fancyhw metrics bridge:
//!
//! - [`frame`] - Telemetry frame codec (`FrameCodec`, `Sample`, `DecodeError`)
//! - [`config`] - Logging settings shared by the binaries
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod frame;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use frame::{
    ByteOrder, DecodeError, DecodedFrame, FrameCodec, ProtocolAnomaly, SAMPLE_WIDTH, Sample,
    encode_frame,
};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Supports two
/// output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
