//! Aggregates several transports into one logical connection.
//!
//! Inbound streams of every transport are merged. Outbound messages are
//! serialized once and handed to all transports concurrently; a send only
//! succeeds when every transport succeeded.

use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::{BeaconConnectionMessage, P2pPeer, SerializedConnectionMessage};
use crate::message::{MessageError, Serializer};
use crate::transport::{ConnectionType, Transport, TransportError};

// ============================================================================
// Errors
// ============================================================================

/// A send failure on one transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{connection_type} connection failed: {cause}")]
pub struct ConnectionException {
    pub connection_type: ConnectionType,
    pub cause: TransportError,
}

/// Send failures on several transports, at most one per connection type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct MultipleConnectionException {
    pub errors: Vec<ConnectionException>,
}

impl MultipleConnectionException {
    /// Collapse failures sharing a connection type, keeping the first.
    pub fn new(errors: Vec<ConnectionException>) -> Self {
        let mut unique: Vec<ConnectionException> = Vec::with_capacity(errors.len());
        for error in errors {
            if !unique
                .iter()
                .any(|e| e.connection_type == error.connection_type)
            {
                unique.push(error);
            }
        }
        Self { errors: unique }
    }
}

impl fmt::Display for MultipleConnectionException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} connections failed: ", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Connection(#[from] ConnectionException),

    #[error(transparent)]
    MultipleConnections(#[from] MultipleConnectionException),
}

// ============================================================================
// Controller
// ============================================================================

pub struct ConnectionController {
    transports: Vec<Arc<dyn Transport>>,
    serializer: Serializer,
}

impl ConnectionController {
    pub fn new(transports: Vec<Arc<dyn Transport>>, serializer: Serializer) -> Self {
        Self {
            transports,
            serializer,
        }
    }

    pub fn connection_types(&self) -> Vec<ConnectionType> {
        self.transports.iter().map(|t| t.connection_type()).collect()
    }

    /// Merged inbound messages of every transport. Decode failures are
    /// reported per item and never end the stream.
    pub fn subscribe(&self) -> BoxStream<'static, Result<BeaconConnectionMessage, ControllerError>> {
        let serializer = self.serializer.clone();
        let streams = self.transports.iter().map(|t| t.subscribe());
        stream::select_all(streams)
            .map(move |item| -> Result<BeaconConnectionMessage, ControllerError> {
                let message = item?;
                let content = serializer.deserialize(&message.content).map_err(|e| {
                    debug!(origin = message.origin.id(), error = %e, "discarding undecodable message");
                    e
                })?;
                Ok(BeaconConnectionMessage::new(message.origin, content))
            })
            .boxed()
    }

    /// Serialize once and send through every transport.
    ///
    /// One failing transport yields [`ConnectionException`]; two or more
    /// yield [`MultipleConnectionException`].
    pub async fn send(&self, message: BeaconConnectionMessage) -> Result<(), ControllerError> {
        let serialized = SerializedConnectionMessage::new(
            message.origin,
            self.serializer.serialize(&message.content)?,
        );

        let results = join_all(self.transports.iter().map(|transport| {
            let message = serialized.clone();
            async move {
                transport
                    .send(message)
                    .await
                    .map_err(|cause| ConnectionException {
                        connection_type: transport.connection_type(),
                        cause,
                    })
            }
        }))
        .await;

        let mut errors: Vec<ConnectionException> =
            results.into_iter().filter_map(Result::err).collect();
        match errors.len() {
            0 => Ok(()),
            1 => {
                let error = errors.remove(0);
                warn!(connection_type = %error.connection_type, error = %error.cause, "send failed");
                Err(ControllerError::Connection(error))
            }
            _ => {
                let error = MultipleConnectionException::new(errors);
                warn!(failures = error.errors.len(), "send failed on multiple transports");
                Err(ControllerError::MultipleConnections(error))
            }
        }
    }

    /// Merged channel-opening requests of every transport.
    pub fn start_open_channel_listener(&self) -> BoxStream<'static, Result<P2pPeer, TransportError>> {
        stream::select_all(
            self.transports
                .iter()
                .map(|t| t.start_open_channel_listener()),
        )
        .boxed()
    }

    /// Relay servers of every transport, in transport order.
    pub async fn relay_servers(&self) -> Vec<String> {
        join_all(self.transports.iter().map(|t| t.relay_servers()))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}
