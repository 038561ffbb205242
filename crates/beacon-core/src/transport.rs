//! The connection channel abstraction.
//!
//! A transport moves serialized messages between the local party and its
//! peers. Implementations provide the raw operations; the provided
//! `subscribe`/`send` wrappers add the logging every transport shares.

use std::fmt;

use async_trait::async_trait;
use beacon_crypto::CryptoError;
use futures_util::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tracing::debug;

use crate::data::{P2pPeer, SerializedConnectionMessage};
use crate::storage::StorageError;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// Relay-backed peer-to-peer channel.
    P2p,
    /// Direct socket to a peer on the same host or network.
    Direct,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::P2p => f.write_str("p2p"),
            ConnectionType::Direct => f.write_str("direct"),
        }
    }
}

/// Transport errors. Cloneable so they can travel through shared streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no relay available: {0}")]
    RelayUnavailable(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("operation timed out")]
    Timeout,

    #[error("subscription closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

pub type TransportStream<T> = BoxStream<'static, Result<T, TransportError>>;

// ============================================================================
// Trait
// ============================================================================

#[async_trait]
pub trait Transport: Send + Sync {
    fn connection_type(&self) -> ConnectionType;

    /// Inbound messages from every peer known to this transport.
    fn connection_messages(&self) -> TransportStream<SerializedConnectionMessage>;

    async fn send_message(&self, message: SerializedConnectionMessage) -> Result<(), TransportError>;

    /// Peers asking to open a channel with us.
    fn open_channel_requests(&self) -> TransportStream<P2pPeer>;

    async fn relay_servers(&self) -> Vec<String>;

    fn subscribe(&self) -> TransportStream<SerializedConnectionMessage> {
        let connection_type = self.connection_type();
        debug!(%connection_type, "subscribed");
        self.connection_messages()
            .inspect(move |item| {
                if let Err(e) = item {
                    debug!(%connection_type, error = %e, "inbound message failed");
                }
            })
            .boxed()
    }

    async fn send(&self, message: SerializedConnectionMessage) -> Result<(), TransportError> {
        debug!(
            connection_type = %self.connection_type(),
            destination = message.origin.id(),
            "sending"
        );
        self.send_message(message).await
    }

    fn start_open_channel_listener(&self) -> TransportStream<P2pPeer> {
        debug!(connection_type = %self.connection_type(), "listening for channel opening");
        self.open_channel_requests()
    }
}
