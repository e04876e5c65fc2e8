use thiserror::Error;

/// Common error type for fancyhw components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using fancyhw's Error.
pub type Result<T> = std::result::Result<T, Error>;
