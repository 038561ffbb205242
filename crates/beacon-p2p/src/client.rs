//! The relay-backed peer channel.
//!
//! [`PeerChannel`] owns the local identity, a set of relay backends and the
//! per-peer session cache. Inbound traffic is fanned in from every backend;
//! outbound traffic is replicated across the relays selected for the
//! recipient.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::config::BeaconConfig;
use beacon_core::P2pPeer;
use beacon_crypto::hash::hash32;
use beacon_crypto::{
    decrypt_asymmetric, decrypt_symmetric, encrypt_asymmetric, encrypt_symmetric,
    validate_ciphertext_shape, Identity, SessionRole,
};
use dashmap::DashMap;
use futures_util::future::join_all;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::communicator::{
    channel_opening_message, is_message_from, mailbox_prefix, pairing_payload,
    parse_channel_opening, parse_pairing_payload, recipient_identifier, AppIdentity,
};
use crate::error::P2pError;
use crate::relay::{RelayClient, RelayEvent, RelayEventStream};
use crate::selector::{replica_nonce, RelaySelector};
use crate::session::SessionManager;

/// Decrypted messages from one peer.
pub type MessageStream = BoxStream<'static, Result<String, P2pError>>;

/// Peers that opened a channel with us.
pub type PairingStream = BoxStream<'static, Result<P2pPeer, P2pError>>;

const SUBSCRIPTION_BUFFER: usize = 256;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct PeerChannelConfig {
    pub app_name: String,
    pub app_icon: Option<String>,
    pub app_url: Option<String>,
    /// Key exchange role. Wallets answer pairing requests as the server,
    /// dApps initiate as the client.
    pub role: SessionRole,
    pub replication_count: usize,
    /// Limit for a single room resolution plus publish.
    pub timeout: Duration,
}

impl Default for PeerChannelConfig {
    fn default() -> Self {
        Self {
            app_name: "beacon".to_string(),
            app_icon: None,
            app_url: None,
            role: SessionRole::Server,
            replication_count: 1,
            timeout: Duration::from_secs(30),
        }
    }
}

impl PeerChannelConfig {
    pub fn from_config(config: &BeaconConfig, role: SessionRole) -> Self {
        Self {
            app_name: config.app.name.clone(),
            app_icon: config.app.icon.clone(),
            app_url: config.app.url.clone(),
            role,
            replication_count: config.p2p.replication_count,
            timeout: config.p2p.timeout(),
        }
    }
}

// ============================================================================
// Peer Channel
// ============================================================================

struct Subscription {
    sender: broadcast::Sender<Result<String, P2pError>>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// A subscription without receivers is closing, whether or not its task
    /// has noticed yet.
    fn is_live(&self) -> bool {
        !self.task.is_finished() && self.sender.receiver_count() > 0
    }
}

pub struct PeerChannel {
    identity: Arc<Identity>,
    relay_clients: Vec<Arc<dyn RelayClient>>,
    selector: RelaySelector,
    sessions: Arc<SessionManager>,
    subscriptions: DashMap<String, Subscription>,
    config: PeerChannelConfig,
}

impl PeerChannel {
    pub fn new(
        identity: Arc<Identity>,
        relay_clients: Vec<Arc<dyn RelayClient>>,
        selector: RelaySelector,
        config: PeerChannelConfig,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(identity.clone(), config.role));
        Self {
            identity,
            relay_clients,
            selector,
            sessions,
            subscriptions: DashMap::new(),
            config,
        }
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.identity.public_key())
    }

    /// The relay hosting our own mailbox.
    pub fn own_relay_server(&self) -> Result<String, P2pError> {
        let relay = self.selector.select(&hash32(&self.identity.public_key()), None);
        if relay.is_empty() {
            return Err(P2pError::RelayUnavailable);
        }
        Ok(relay)
    }

    pub fn relay_servers(&self) -> Vec<String> {
        self.selector.nodes().to_vec()
    }

    /// Payload answering `peer`'s pairing request.
    pub fn pairing_payload(&self, peer: &P2pPeer) -> Result<String, P2pError> {
        let app = AppIdentity {
            name: self.config.app_name.clone(),
            icon: self.config.app_icon.clone(),
            app_url: self.config.app_url.clone(),
            public_key: self.public_key_hex(),
        };
        pairing_payload(peer, &app, &self.own_relay_server()?)
    }

    /// Seal our pairing payload for `peer` and drop it into their mailbox on
    /// the relay they advertised.
    pub async fn send_pairing_request(&self, peer: &P2pPeer) -> Result<(), P2pError> {
        let peer_key = peer_key(peer)?;
        let payload = self.pairing_payload(peer)?;
        let sealed = encrypt_asymmetric(payload.as_bytes(), &peer_key)?;
        let recipient = recipient_identifier(&peer_key, &peer.relay_server);
        let marker: Arc<str> = channel_opening_message(&recipient, &hex::encode(sealed)).into();

        let attempts = self
            .relay_clients
            .iter()
            .map(|client| publish(client.clone(), recipient.clone(), marker.clone(), self.config.timeout));
        let result = aggregate(join_all(attempts).await);
        match &result {
            Ok(()) => info!(peer = %peer.public_key, relay = %peer.relay_server, "pairing request sent"),
            Err(e) => warn!(peer = %peer.public_key, error = %e, "pairing request failed"),
        }
        result
    }

    /// Decrypted messages from `peer_public_key`. Subscriptions are shared:
    /// repeated calls attach to the same underlying relay stream.
    pub fn subscribe(&self, peer_public_key: &[u8]) -> MessageStream {
        let key = hex::encode(peer_public_key);

        let receiver = match self.subscriptions.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if !entry.get().is_live() {
                    debug!(peer = %key, "replacing finished subscription");
                    let (subscription, receiver) = self.spawn_subscription(peer_public_key);
                    entry.insert(subscription).task.abort();
                    receiver
                } else {
                    entry.get().sender.subscribe()
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!(peer = %key, "subscribing");
                let (subscription, receiver) = self.spawn_subscription(peer_public_key);
                entry.insert(subscription);
                receiver
            }
        };

        BroadcastStream::new(receiver)
            .map(|item| match item {
                Ok(message) => message,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => Err(P2pError::Lagged(skipped)),
            })
            .boxed()
    }

    /// Start forwarding for `peer_public_key`. The first receiver exists
    /// before the task runs, so the task never sees an empty audience early.
    fn spawn_subscription(
        &self,
        peer_public_key: &[u8],
    ) -> (Subscription, broadcast::Receiver<Result<String, P2pError>>) {
        let (sender, receiver) = broadcast::channel(SUBSCRIPTION_BUFFER);
        let events = merged_events(&self.relay_clients);
        let task = tokio::spawn(forward_messages(
            events,
            peer_public_key.to_vec(),
            self.sessions.clone(),
            sender.clone(),
        ));
        (Subscription { sender, task }, receiver)
    }

    /// Stop listening to `peer_public_key`. Returns whether a subscription existed.
    pub fn unsubscribe(&self, peer_public_key: &[u8]) -> bool {
        match self.subscriptions.remove(&hex::encode(peer_public_key)) {
            Some((key, subscription)) => {
                subscription.task.abort();
                debug!(peer = %key, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Unsubscribe and drop the cached session keys for `peer_public_key`.
    pub fn unpair(&self, peer_public_key: &[u8]) -> bool {
        let unsubscribed = self.unsubscribe(peer_public_key);
        self.sessions.invalidate(peer_public_key);
        unsubscribed
    }

    pub fn is_subscribed(&self, peer_public_key: &[u8]) -> bool {
        self.subscriptions
            .get(&hex::encode(peer_public_key))
            .map(|s| s.is_live())
            .unwrap_or(false)
    }

    /// Encrypt `message` for `peer_public_key` and publish it to every
    /// replica relay through every backend. Succeeds when at least one
    /// publish went through.
    pub async fn send(&self, peer_public_key: &[u8], message: &str) -> Result<(), P2pError> {
        if self.selector.nodes().is_empty() || self.relay_clients.is_empty() {
            return Err(P2pError::RelayUnavailable);
        }

        let keys = self.sessions.get_or_derive(peer_public_key).await?;
        let ciphertext: Arc<str> = hex::encode(encrypt_symmetric(message.as_bytes(), keys.tx())?).into();
        let target = hash32(peer_public_key);

        let mut attempts = Vec::new();
        for replica in 0..self.config.replication_count.max(1) {
            let relay = self.selector.select(&target, Some(&replica_nonce(replica)));
            let recipient = recipient_identifier(peer_public_key, &relay);
            for client in &self.relay_clients {
                attempts.push(publish(
                    client.clone(),
                    recipient.clone(),
                    ciphertext.clone(),
                    self.config.timeout,
                ));
            }
        }

        let result = aggregate(join_all(attempts).await);
        if let Err(e) = &result {
            warn!(peer = %hex::encode(peer_public_key), error = %e, "send failed");
        }
        result
    }

    /// Peers announcing themselves through a channel-open marker addressed
    /// to our mailbox.
    pub fn listen_for_channel_opening(&self) -> PairingStream {
        let prefix = mailbox_prefix(&self.identity.public_key());
        let identity = self.identity.clone();

        merged_events(&self.relay_clients)
            .filter_map(move |event| {
                let prefix = prefix.clone();
                let identity = identity.clone();
                async move {
                    let event = match event {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(error = %e, "relay event failed");
                            return None;
                        }
                    };
                    let (recipient, payload) = parse_channel_opening(&event.message)?;
                    if !recipient.starts_with(&prefix) {
                        return None;
                    }
                    Some(open_pairing(&identity, payload, &event.sender))
                }
            })
            .boxed()
    }
}

impl Drop for PeerChannel {
    fn drop(&mut self) {
        for entry in self.subscriptions.iter() {
            entry.task.abort();
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn peer_key(peer: &P2pPeer) -> Result<Vec<u8>, P2pError> {
    match peer.public_key_bytes() {
        Ok(bytes) if bytes.len() == 32 => Ok(bytes),
        _ => Err(P2pError::InvalidPeerKey(peer.public_key.clone())),
    }
}

fn merged_events(clients: &[Arc<dyn RelayClient>]) -> RelayEventStream {
    stream::select_all(clients.iter().map(|client| client.events())).boxed()
}

async fn publish(
    client: Arc<dyn RelayClient>,
    recipient: String,
    message: Arc<str>,
    limit: Duration,
) -> Result<(), P2pError> {
    let attempt = async {
        let room = client.create_or_join_room(&recipient).await?;
        client.publish(&room, &message).await?;
        Ok::<_, P2pError>(())
    };
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(P2pError::Timeout),
    }
}

fn aggregate(results: Vec<Result<(), P2pError>>) -> Result<(), P2pError> {
    let attempts = results.len();
    let mut last = None;
    for result in results {
        match result {
            Ok(()) => return Ok(()),
            Err(e) => last = Some(e),
        }
    }
    match last {
        Some(e) => Err(P2pError::PublishFailed {
            attempts,
            last: e.to_string(),
        }),
        None => Err(P2pError::RelayUnavailable),
    }
}

async fn forward_messages(
    mut events: RelayEventStream,
    peer_public_key: Vec<u8>,
    sessions: Arc<SessionManager>,
    sender: broadcast::Sender<Result<String, P2pError>>,
) {
    let peer = hex::encode(&peer_public_key);
    loop {
        let event = tokio::select! {
            _ = sender.closed() => {
                debug!(%peer, "no listeners left, closing subscription");
                break;
            }
            event = events.next() => match event {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!(%peer, error = %e, "relay event failed");
                    continue;
                }
                None => {
                    debug!(%peer, "relay events ended");
                    break;
                }
            },
        };
        if !is_message_from(&event, &peer_public_key) || !validate_ciphertext_shape(&event.message) {
            continue;
        }
        let message = decrypt_message(&sessions, &peer_public_key, &event).await;
        if sender.send(message).is_err() {
            debug!(%peer, "no listeners left, closing subscription");
            break;
        }
    }
}

async fn decrypt_message(
    sessions: &SessionManager,
    peer_public_key: &[u8],
    event: &RelayEvent,
) -> Result<String, P2pError> {
    let keys = sessions.get_or_derive(peer_public_key).await?;
    let ciphertext = hex::decode(&event.message).map_err(|e| P2pError::InvalidEncoding(e.to_string()))?;
    let plaintext = decrypt_symmetric(&ciphertext, keys.rx())?;
    String::from_utf8(plaintext).map_err(|e| P2pError::InvalidEncoding(e.to_string()))
}

fn open_pairing(identity: &Identity, payload: &str, sender: &str) -> Result<P2pPeer, P2pError> {
    let sealed = hex::decode(payload).map_err(|e| P2pError::InvalidEncoding(e.to_string()))?;
    let opened = decrypt_asymmetric(&sealed, identity)?;
    let text = String::from_utf8(opened).map_err(|e| P2pError::InvalidEncoding(e.to_string()))?;
    parse_pairing_payload(&text, sender)
}

// ============================================================================
// Client trait
// ============================================================================

/// Peer-addressed view of a channel, as consumed by [`crate::P2pTransport`].
#[async_trait]
pub trait P2pClient: Send + Sync {
    fn is_subscribed_to(&self, peer: &P2pPeer) -> bool;

    fn subscribe_to(&self, peer: &P2pPeer) -> Result<MessageStream, P2pError>;

    fn unsubscribe_from(&self, peer: &P2pPeer) -> bool;

    fn unpair(&self, peer: &P2pPeer) -> bool;

    async fn send_to(&self, peer: &P2pPeer, message: &str) -> Result<(), P2pError>;

    async fn request_pairing(&self, peer: &P2pPeer) -> Result<(), P2pError>;

    fn channel_openings(&self) -> PairingStream;

    fn relay_nodes(&self) -> Vec<String>;
}

#[async_trait]
impl P2pClient for PeerChannel {
    fn is_subscribed_to(&self, peer: &P2pPeer) -> bool {
        peer_key(peer).map(|key| self.is_subscribed(&key)).unwrap_or(false)
    }

    fn subscribe_to(&self, peer: &P2pPeer) -> Result<MessageStream, P2pError> {
        Ok(self.subscribe(&peer_key(peer)?))
    }

    fn unsubscribe_from(&self, peer: &P2pPeer) -> bool {
        peer_key(peer).map(|key| self.unsubscribe(&key)).unwrap_or(false)
    }

    fn unpair(&self, peer: &P2pPeer) -> bool {
        peer_key(peer).map(|key| PeerChannel::unpair(self, &key)).unwrap_or(false)
    }

    async fn send_to(&self, peer: &P2pPeer, message: &str) -> Result<(), P2pError> {
        self.send(&peer_key(peer)?, message).await
    }

    async fn request_pairing(&self, peer: &P2pPeer) -> Result<(), P2pError> {
        self.send_pairing_request(peer).await
    }

    fn channel_openings(&self) -> PairingStream {
        self.listen_for_channel_opening()
    }

    fn relay_nodes(&self) -> Vec<String> {
        self.relay_servers()
    }
}
