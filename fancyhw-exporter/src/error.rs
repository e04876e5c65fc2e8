//! Error taxonomy of the bridge.

use std::time::Duration;

use fancyhw_common::{DecodeError, ProtocolAnomaly};
use thiserror::Error;

/// Errors raised while setting up or running the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The subscriber socket could not be established or was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No frame arrived within the receive timeout.
    #[error("No frame received within {0:?}")]
    Timeout(Duration),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Protocol anomaly: {0}")]
    ProtocolAnomaly(#[from] ProtocolAnomaly),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BridgeError {
    /// Whether the poll loop may skip the cycle and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_) | BridgeError::Decode(_) | BridgeError::ProtocolAnomaly(_)
        )
    }
}

impl From<zmq::Error> for BridgeError {
    fn from(e: zmq::Error) -> Self {
        BridgeError::Connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(BridgeError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(BridgeError::from(DecodeError::MissingSeparator).is_recoverable());
        assert!(BridgeError::from(ProtocolAnomaly { sample_count: 2 }).is_recoverable());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(!BridgeError::Connection("gone".to_string()).is_recoverable());
        assert!(!BridgeError::Configuration("bad".to_string()).is_recoverable());
        assert!(!BridgeError::from(zmq::Error::ETERM).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = BridgeError::from(ProtocolAnomaly { sample_count: 2 });
        assert_eq!(
            err.to_string(),
            "Protocol anomaly: Expected exactly 1 sample per frame, got 2"
        );
    }
}
