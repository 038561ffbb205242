//! In-memory relay network for tests and local demos.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::communicator::mailbox_prefix;
use crate::relay::{RelayClient, RelayError, RelayEvent, RelayEventStream};
use crate::selector::RelaySelector;

type Listener = mpsc::UnboundedSender<Result<RelayEvent, RelayError>>;

struct Room {
    node: String,
    members: [String; 2],
}

#[derive(Default)]
struct NetworkState {
    room_ids: HashMap<(String, String, String), String>,
    rooms: HashMap<String, Room>,
    listeners: Vec<(String, Listener)>,
    failing: HashSet<String>,
    published: Vec<RelayEvent>,
}

/// A set of relay nodes shared by every client created from it.
///
/// Rooms connect exactly two mailboxes on one node. A published message is
/// delivered to every client of the other mailbox, whatever node it
/// registered with.
#[derive(Clone)]
pub struct InMemoryRelayNetwork {
    state: Arc<Mutex<NetworkState>>,
    selector: RelaySelector,
}

impl InMemoryRelayNetwork {
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Arc::new(Mutex::new(NetworkState::default())),
            selector: RelaySelector::new(nodes.into_iter().map(Into::into).collect()),
        }
    }

    pub fn selector(&self) -> RelaySelector {
        self.selector.clone()
    }

    /// A client logged in as `public_key` on its home relay.
    pub fn client(&self, public_key: &[u8]) -> Arc<InMemoryRelayClient> {
        Arc::new(InMemoryRelayClient {
            state: self.state.clone(),
            mailbox: mailbox_prefix(public_key),
            home: self.selector.select_for(public_key, None),
        })
    }

    /// Make every call touching `node` fail as unavailable.
    pub fn fail_node(&self, node: &str) {
        self.state.lock().failing.insert(node.to_string());
    }

    pub fn restore_node(&self, node: &str) {
        self.state.lock().failing.remove(node);
    }

    /// Every message published so far, in order.
    pub fn published(&self) -> Vec<RelayEvent> {
        self.state.lock().published.clone()
    }

    /// Event streams still held by some client.
    pub fn listener_count(&self) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    /// Push a stream error to every client of `public_key`.
    pub fn inject_error(&self, public_key: &[u8], error: RelayError) {
        let mailbox = mailbox_prefix(public_key);
        self.state
            .lock()
            .listeners
            .retain(|(owner, tx)| *owner != mailbox || tx.send(Err(error.clone())).is_ok());
    }
}

pub struct InMemoryRelayClient {
    state: Arc<Mutex<NetworkState>>,
    mailbox: String,
    home: String,
}

impl InMemoryRelayClient {
    /// Address this client publishes under.
    pub fn address(&self) -> String {
        format!("{}:{}", self.mailbox, self.home)
    }
}

#[async_trait]
impl RelayClient for InMemoryRelayClient {
    async fn create_or_join_room(&self, recipient: &str) -> Result<String, RelayError> {
        let (mailbox, node) = recipient
            .split_once(':')
            .filter(|(mailbox, node)| mailbox.starts_with('@') && !node.is_empty())
            .ok_or_else(|| RelayError::InvalidRecipient(recipient.to_string()))?;

        let mut state = self.state.lock();
        if state.failing.contains(node) {
            return Err(RelayError::Unavailable(node.to_string()));
        }

        let (a, b) = if self.mailbox.as_str() <= mailbox {
            (self.mailbox.clone(), mailbox.to_string())
        } else {
            (mailbox.to_string(), self.mailbox.clone())
        };
        let key = (node.to_string(), a.clone(), b.clone());
        if let Some(room) = state.room_ids.get(&key) {
            return Ok(room.clone());
        }

        let room = format!("!room{}:{node}", state.rooms.len());
        state.rooms.insert(
            room.clone(),
            Room {
                node: node.to_string(),
                members: [a, b],
            },
        );
        state.room_ids.insert(key, room.clone());
        Ok(room)
    }

    async fn publish(&self, room: &str, message: &str) -> Result<(), RelayError> {
        let mut state = self.state.lock();
        let (node, members) = match state.rooms.get(room) {
            Some(r) => (r.node.clone(), r.members.clone()),
            None => return Err(RelayError::RoomNotFound(room.to_string())),
        };
        if state.failing.contains(&node) {
            return Err(RelayError::Unavailable(node));
        }
        if !members.contains(&self.mailbox) {
            return Err(RelayError::PublishFailed(format!("not a member of {room}")));
        }

        let event = RelayEvent {
            node,
            room: room.to_string(),
            sender: self.address(),
            message: message.to_string(),
        };
        state.published.push(event.clone());
        let own = &self.mailbox;
        state.listeners.retain(|(owner, tx)| {
            if owner == own || !members.contains(owner) {
                return true;
            }
            tx.send(Ok(event.clone())).is_ok()
        });
        Ok(())
    }

    fn events(&self) -> RelayEventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().listeners.push((self.mailbox.clone(), tx));
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
    }
}

/// A relay that resolves rooms but never finishes a publish.
pub struct StalledRelayClient;

#[async_trait]
impl RelayClient for StalledRelayClient {
    async fn create_or_join_room(&self, recipient: &str) -> Result<String, RelayError> {
        Ok(format!("!stalled:{recipient}"))
    }

    async fn publish(&self, _room: &str, _message: &str) -> Result<(), RelayError> {
        future::pending().await
    }

    fn events(&self) -> RelayEventStream {
        stream::pending().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_room_is_shared_between_both_mailboxes() {
        let network = InMemoryRelayNetwork::new(["node"]);
        let alice = network.client(&[1u8; 32]);
        let bob = network.client(&[2u8; 32]);

        let a = alice
            .create_or_join_room(&format!("{}:node", mailbox_prefix(&[2u8; 32])))
            .await
            .unwrap();
        let b = bob
            .create_or_join_room(&format!("{}:node", mailbox_prefix(&[1u8; 32])))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "!room0:node");
    }

    #[tokio::test]
    async fn test_publish_delivers_to_other_member_only() {
        let network = InMemoryRelayNetwork::new(["node"]);
        let alice = network.client(&[1u8; 32]);
        let bob = network.client(&[2u8; 32]);
        let carol = network.client(&[3u8; 32]);
        let mut alice_events = alice.events();
        let mut bob_events = bob.events();
        let mut carol_events = carol.events();

        let room = alice
            .create_or_join_room(&format!("{}:node", mailbox_prefix(&[2u8; 32])))
            .await
            .unwrap();
        alice.publish(&room, "hi").await.unwrap();
        network.inject_error(&[3u8; 32], RelayError::Stream("injected".into()));

        let event = bob_events.next().await.unwrap().unwrap();
        assert_eq!(event.message, "hi");
        assert_eq!(event.sender, alice.address());
        assert_eq!(event.node, "node");

        assert!(carol_events.next().await.unwrap().is_err());
        network.inject_error(&[1u8; 32], RelayError::Stream("injected".into()));
        assert!(alice_events.next().await.unwrap().is_err());
        assert_eq!(network.published().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_node() {
        let network = InMemoryRelayNetwork::new(["node"]);
        let alice = network.client(&[1u8; 32]);
        let recipient = format!("{}:node", mailbox_prefix(&[2u8; 32]));

        network.fail_node("node");
        assert_eq!(
            alice.create_or_join_room(&recipient).await,
            Err(RelayError::Unavailable("node".into()))
        );
        network.restore_node("node");
        assert!(alice.create_or_join_room(&recipient).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let network = InMemoryRelayNetwork::new(["node"]);
        let alice = network.client(&[1u8; 32]);
        assert!(matches!(
            alice.create_or_join_room("nobody").await,
            Err(RelayError::InvalidRecipient(_))
        ));
        assert!(matches!(
            alice.publish("!missing:node", "x").await,
            Err(RelayError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listener_count_tracks_dropped_streams() {
        let network = InMemoryRelayNetwork::new(["node"]);
        let alice = network.client(&[1u8; 32]);
        let first = alice.events();
        let _second = alice.events();
        assert_eq!(network.listener_count(), 2);
        drop(first);
        assert_eq!(network.listener_count(), 1);
    }
}
