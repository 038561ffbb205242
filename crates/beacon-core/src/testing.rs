//! Testing utilities for code built on [`Transport`].

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::data::{P2pPeer, SerializedConnectionMessage};
use crate::transport::{ConnectionType, Transport, TransportError, TransportStream};

/// Mock transport for testing
pub struct MockTransport {
    sent: Mutex<Vec<SerializedConnectionMessage>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SerializedConnectionMessage>>>,
    pairing_listeners: Mutex<Vec<mpsc::UnboundedSender<P2pPeer>>>,
    send_failure: Option<TransportError>,
    relay_servers: Vec<String>,
    connection_type: ConnectionType,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            pairing_listeners: Mutex::new(Vec::new()),
            send_failure: None,
            relay_servers: Vec::new(),
            connection_type: ConnectionType::P2p,
        }
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    /// Make every send fail with `error`.
    pub fn with_send_failure(mut self, error: TransportError) -> Self {
        self.send_failure = Some(error);
        self
    }

    pub fn with_relay_servers(mut self, relay_servers: Vec<String>) -> Self {
        self.relay_servers = relay_servers;
        self
    }

    /// Deliver an inbound message to every current subscriber.
    pub fn inject(&self, message: SerializedConnectionMessage) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(message.clone()).is_ok());
    }

    /// Deliver a channel-opening request to every current listener.
    pub fn inject_pairing_request(&self, peer: P2pPeer) {
        self.pairing_listeners
            .lock()
            .retain(|tx| tx.send(peer.clone()).is_ok());
    }

    /// Messages successfully sent so far.
    pub fn sent(&self) -> Vec<SerializedConnectionMessage> {
        self.sent.lock().clone()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn receiver_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> TransportStream<T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (Ok(item), rx)) }).boxed()
}

#[async_trait]
impl Transport for MockTransport {
    fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    fn connection_messages(&self) -> TransportStream<SerializedConnectionMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        receiver_stream(rx)
    }

    async fn send_message(&self, message: SerializedConnectionMessage) -> Result<(), TransportError> {
        if let Some(error) = &self.send_failure {
            return Err(error.clone());
        }
        self.sent.lock().push(message);
        Ok(())
    }

    fn open_channel_requests(&self) -> TransportStream<P2pPeer> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pairing_listeners.lock().push(tx);
        receiver_stream(rx)
    }

    async fn relay_servers(&self) -> Vec<String> {
        self.relay_servers.clone()
    }
}
