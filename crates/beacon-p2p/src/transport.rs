//! [`Transport`] over a peer channel.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::storage::StorageManager;
use beacon_core::transport::TransportStream;
use beacon_core::{
    ConnectionMessage, ConnectionType, Origin, P2pPeer, SerializedConnectionMessage, Transport,
    TransportError,
};
use futures_util::future;
use futures_util::stream::{self, BoxStream, SelectAll, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tracing::{debug, info, warn};

use crate::client::P2pClient;

const INBOUND_BUFFER: usize = 256;

/// Carries serialized messages to and from the peers known to storage.
pub struct P2pTransport {
    client: Arc<dyn P2pClient>,
    storage: StorageManager,
}

impl P2pTransport {
    pub fn new(client: Arc<dyn P2pClient>, storage: StorageManager) -> Self {
        Self { client, storage }
    }

    /// Answer `peer`'s pairing request and remember it as paired.
    pub async fn pair(&self, mut peer: P2pPeer) -> Result<(), TransportError> {
        self.client.request_pairing(&peer).await?;
        peer.is_paired = true;
        info!(peer = %peer.public_key, name = %peer.name, "paired");
        self.storage.add_peers(vec![peer]).await?;
        Ok(())
    }

    /// Remember a peer that opened a channel with us.
    pub async fn accept(&self, mut peer: P2pPeer) -> Result<(), TransportError> {
        peer.is_paired = true;
        debug!(peer = %peer.public_key, "accepted channel opening");
        self.storage.add_peers(vec![peer]).await?;
        Ok(())
    }

    /// Forget `peer` and stop listening to it.
    pub async fn disconnect(&self, peer: &P2pPeer) -> Result<(), TransportError> {
        self.client.unpair(peer);
        let public_key = peer.public_key.clone();
        let removed = self
            .storage
            .remove_peers(move |p| p.public_key.eq_ignore_ascii_case(&public_key))
            .await?;
        debug!(peer = %peer.public_key, removed = removed.len(), "disconnected");
        Ok(())
    }
}

#[async_trait]
impl Transport for P2pTransport {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::P2p
    }

    /// Messages of every stored peer, and of every peer added later, until
    /// the returned stream is dropped.
    fn connection_messages(&self) -> TransportStream<SerializedConnectionMessage> {
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let inbound = Inbound::new(self.client.clone(), self.storage.clone());
        tokio::spawn(inbound.run(tx));
        ReceiverStream::new(rx).boxed()
    }

    async fn send_message(&self, message: SerializedConnectionMessage) -> Result<(), TransportError> {
        let destination = message.origin.id().to_string();
        let lookup = destination.clone();
        let peer = self
            .storage
            .find_peer(move |p| p.public_key.eq_ignore_ascii_case(&lookup))
            .await?
            .ok_or(TransportError::PeerNotFound(destination))?;
        self.client.send_to(&peer, &message.content).await?;
        Ok(())
    }

    fn open_channel_requests(&self) -> TransportStream<P2pPeer> {
        self.client
            .channel_openings()
            .map(|item| item.map_err(TransportError::from))
            .boxed()
    }

    async fn relay_servers(&self) -> Vec<String> {
        self.client.relay_nodes()
    }
}

type InboundItem = Result<SerializedConnectionMessage, TransportError>;

/// Fan-in of the peers known to storage, growing as peers are added.
struct Inbound {
    client: Arc<dyn P2pClient>,
    storage: StorageManager,
    updates: BoxStream<'static, Result<Vec<P2pPeer>, BroadcastStreamRecvError>>,
    messages: SelectAll<TransportStream<SerializedConnectionMessage>>,
    followed: HashSet<String>,
}

enum Step {
    Peers(Vec<P2pPeer>),
    Reload,
    Forward(InboundItem),
    Stop,
}

impl Inbound {
    fn new(client: Arc<dyn P2pClient>, storage: StorageManager) -> Self {
        // Listen before the first read so no addition falls in between.
        let updates = BroadcastStream::new(storage.peer_updates()).boxed();
        Self {
            client,
            storage,
            updates,
            messages: SelectAll::new(),
            followed: HashSet::new(),
        }
    }

    async fn run(mut self, tx: mpsc::Sender<InboundItem>) {
        let mut step = Step::Reload;
        loop {
            match step {
                Step::Peers(peers) => self.follow(peers),
                Step::Reload => match self.storage.peers().await {
                    Ok(peers) => self.follow(peers),
                    Err(e) => {
                        if tx.send(Err(e.into())).await.is_err() {
                            break;
                        }
                    }
                },
                Step::Forward(item) => {
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }
                Step::Stop => break,
            }

            step = tokio::select! {
                _ = tx.closed() => Step::Stop,
                update = self.updates.next() => match update {
                    Some(Ok(peers)) => Step::Peers(peers),
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(skipped, "peer updates lagged, reloading stored peers");
                        Step::Reload
                    }
                    None => Step::Stop,
                },
                Some(item) = self.messages.next(), if !self.messages.is_empty() => Step::Forward(item),
            };
        }
        debug!(peers = self.followed.len(), "inbound peer stream closed");
    }

    /// Subscribe to the peers not followed yet. A followed peer whose
    /// channel subscription has ended (after a disconnect) is followed again.
    fn follow(&mut self, peers: Vec<P2pPeer>) {
        for peer in peers {
            let key = peer.public_key.to_ascii_lowercase();
            if self.followed.contains(&key) && self.client.is_subscribed_to(&peer) {
                continue;
            }
            debug!(peer = %peer.public_key, "following peer");
            self.followed.insert(key);
            self.messages.push(peer_messages(self.client.as_ref(), peer));
        }
    }
}

fn peer_messages(client: &dyn P2pClient, peer: P2pPeer) -> TransportStream<SerializedConnectionMessage> {
    match client.subscribe_to(&peer) {
        Ok(messages) => {
            let origin = Origin::for_peer(&peer);
            messages
                .map(move |item| {
                    item.map(|content| ConnectionMessage::new(origin.clone(), content))
                        .map_err(TransportError::from)
                })
                .boxed()
        }
        Err(e) => stream::once(future::ready(Err(TransportError::from(e)))).boxed(),
    }
}
