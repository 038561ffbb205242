use beacon_core::TransportError;
use beacon_crypto::CryptoError;
use thiserror::Error;

use crate::relay::RelayError;

/// Errors of the peer-to-peer channel. Cloneable so they can be fanned out
/// to every subscriber of a shared stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum P2pError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("no relay available")]
    RelayUnavailable,

    #[error("invalid peer public key: {0}")]
    InvalidPeerKey(String),

    #[error("invalid pairing payload: {0}")]
    InvalidPairingPayload(String),

    #[error("invalid message encoding: {0}")]
    InvalidEncoding(String),

    #[error("relay call timed out")]
    Timeout,

    #[error("subscription lagged behind, {0} messages skipped")]
    Lagged(u64),

    #[error("all {attempts} publish attempts failed, last error: {last}")]
    PublishFailed { attempts: usize, last: String },

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<P2pError> for TransportError {
    fn from(e: P2pError) -> Self {
        match e {
            P2pError::Crypto(e) => TransportError::Crypto(e),
            P2pError::RelayUnavailable => TransportError::RelayUnavailable("empty relay pool".into()),
            P2pError::Relay(RelayError::Unavailable(node)) => TransportError::RelayUnavailable(node),
            P2pError::Timeout => TransportError::Timeout,
            P2pError::InvalidPeerKey(key) => TransportError::PeerNotFound(key),
            P2pError::PublishFailed { .. } | P2pError::Relay(_) => TransportError::SendFailed(e.to_string()),
            other => TransportError::Other(other.to_string()),
        }
    }
}
