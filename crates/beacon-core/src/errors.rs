//! Error types for Beacon Core.
//!
//! Each module owns its error enum; [`CoreError`] unifies them for callers
//! that drive the whole stack.

use beacon_crypto::CryptoError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::controller::{ConnectionException, ControllerError, MultipleConnectionException};
use crate::message::MessageError;
use crate::storage::StorageError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("message error: {0}")]
    Message(#[from] MessageError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionException),

    #[error(transparent)]
    MultipleConnections(#[from] MultipleConnectionException),

    #[error("SDK initialization failed: {0}")]
    Initialization(String),
}

impl From<ControllerError> for CoreError {
    fn from(e: ControllerError) -> Self {
        match e {
            ControllerError::Message(e) => CoreError::Message(e),
            ControllerError::Transport(e) => CoreError::Transport(e),
            ControllerError::Connection(e) => CoreError::Connection(e),
            ControllerError::MultipleConnections(e) => CoreError::MultipleConnections(e),
        }
    }
}

impl CoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::Transport(TransportError::Timeout)
                | CoreError::Transport(TransportError::RelayUnavailable(_))
                | CoreError::Connection(_)
                | CoreError::MultipleConnections(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionType;

    #[test]
    fn test_controller_errors_flatten() {
        let e: CoreError = ControllerError::Connection(ConnectionException {
            connection_type: ConnectionType::P2p,
            cause: TransportError::Timeout,
        })
        .into();
        assert!(matches!(e, CoreError::Connection(_)));
        assert!(e.is_transient());
        assert_eq!(e.to_string(), "p2p connection failed: operation timed out");
    }

    #[test]
    fn test_permanent_errors() {
        let e: CoreError = MessageError::UnsupportedVersion("9".into()).into();
        assert!(!e.is_transient());
        let e: CoreError = CryptoError::InvalidPublicKey.into();
        assert!(!e.is_transient());
    }
}
