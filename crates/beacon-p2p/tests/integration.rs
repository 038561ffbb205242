//! A wallet and a dApp pairing and talking over the in-memory relay network.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::blockchain::BlockchainRegistry;
use beacon_core::config::BeaconConfig;
use beacon_core::message::{BeaconMessage, MessageHeader, VersionedMessage};
use beacon_core::storage::InMemoryStorage;
use beacon_core::controller::{ConnectionException, ControllerError};
use beacon_core::{
    BeaconConnectionMessage, BeaconSdk, ConnectionController, ConnectionType, Origin, P2pPeer, Transport,
    TransportError,
};
use beacon_crypto::SessionRole;
use beacon_p2p::testing::{InMemoryRelayNetwork, StalledRelayClient};
use beacon_p2p::{PeerChannel, PeerChannelConfig, P2pTransport, RelayClient, RelaySelector};
use futures_util::StreamExt;

const NODES: [&str; 4] = [
    "beacon-node-1.test",
    "beacon-node-2.test",
    "beacon-node-3.test",
    "beacon-node-4.test",
];

struct Party {
    sdk: BeaconSdk,
    channel: Arc<PeerChannel>,
    transport: Arc<P2pTransport>,
    controller: ConnectionController,
}

async fn party(network: &InMemoryRelayNetwork, name: &str, role: SessionRole, replication: usize) -> Party {
    let mut config = BeaconConfig::default();
    config.app.name = name.to_string();
    config.p2p.relay_nodes = NODES.iter().map(|n| n.to_string()).collect();
    config.p2p.replication_count = replication;

    let sdk = BeaconSdk::init(
        config,
        Arc::new(InMemoryStorage::new()),
        BlockchainRegistry::passthrough(["tezos"], "tezos"),
    )
    .await
    .unwrap();

    let relay: Arc<dyn RelayClient> = network.client(&sdk.identity().public_key());
    let channel = Arc::new(PeerChannel::new(
        sdk.identity().clone(),
        vec![relay],
        network.selector(),
        PeerChannelConfig::from_config(sdk.config(), role),
    ));
    let transport = Arc::new(P2pTransport::new(channel.clone(), sdk.storage().clone()));
    let controller = sdk.connection_controller(vec![transport.clone() as Arc<dyn Transport>]);

    Party {
        sdk,
        channel,
        transport,
        controller,
    }
}

/// The dApp advertises itself, the wallet answers, the dApp learns the wallet.
async fn pair(wallet: &Party, dapp: &Party, version: &str) -> P2pPeer {
    let dapp_peer = P2pPeer::new(
        "pairing-request",
        "dApp",
        dapp.channel.public_key_hex(),
        dapp.channel.own_relay_server().unwrap(),
        version,
    );

    let mut openings = dapp.controller.start_open_channel_listener();
    wallet.transport.pair(dapp_peer).await.unwrap();

    let wallet_peer = tokio::time::timeout(Duration::from_secs(2), openings.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    dapp.transport.accept(wallet_peer.clone()).await.unwrap();
    wallet_peer
}

/// Wait until `party` listens to `other`'s messages.
async fn until_following(party: &Party, other: &Party) {
    let key = other.sdk.identity().public_key();
    tokio::time::timeout(Duration::from_secs(2), async {
        while !party.channel.is_subscribed(&key) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

fn disconnect_message(from: &Party, to: &str, version: &str) -> BeaconConnectionMessage {
    versioned_disconnect(&from.sdk, to, version)
}

fn versioned_disconnect(sdk: &BeaconSdk, to: &str, version: &str) -> BeaconConnectionMessage {
    let message = BeaconMessage::Disconnect(MessageHeader {
        id: "bye".into(),
        version: version.into(),
        sender_id: sdk.sender_id().to_string(),
        origin: Origin::P2P(sdk.beacon_id().to_string()),
        destination: Origin::P2P(to.to_string()),
    });
    let versioned = VersionedMessage::from_beacon_message(&message, sdk.registry()).unwrap();
    BeaconConnectionMessage::new(Origin::P2P(to.to_string()), versioned)
}

#[tokio::test]
async fn test_pairing_and_exchange() {
    let network = InMemoryRelayNetwork::new(NODES);
    let wallet = party(&network, "Wallet", SessionRole::Server, 1).await;
    let dapp = party(&network, "dApp", SessionRole::Client, 1).await;

    let wallet_peer = pair(&wallet, &dapp, "3").await;
    assert_eq!(wallet_peer.public_key, wallet.sdk.beacon_id());
    assert_eq!(wallet_peer.name, "Wallet");
    assert!(wallet.sdk.storage().peers().await.unwrap()[0].is_paired);

    let mut wallet_inbox = wallet.controller.subscribe();
    let mut dapp_inbox = dapp.controller.subscribe();
    until_following(&wallet, &dapp).await;
    until_following(&dapp, &wallet).await;

    dapp.controller
        .send(disconnect_message(&dapp, wallet.sdk.beacon_id(), "3"))
        .await
        .unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), wallet_inbox.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(received.origin, Origin::P2P(dapp.sdk.beacon_id().to_string()));
    assert_eq!(received.content.id(), "bye");
    assert_eq!(received.content.sender_id(), dapp.sdk.sender_id());

    wallet
        .controller
        .send(disconnect_message(&wallet, dapp.sdk.beacon_id(), "2"))
        .await
        .unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), dapp_inbox.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(received.content.version(), "2");
    assert_eq!(received.origin, Origin::P2P(wallet.sdk.beacon_id().to_string()));
}

#[tokio::test]
async fn test_subscribe_before_pairing() {
    let network = InMemoryRelayNetwork::new(NODES);
    let wallet = party(&network, "Wallet", SessionRole::Server, 1).await;
    let dapp = party(&network, "dApp", SessionRole::Client, 2).await;

    let mut wallet_inbox = wallet.controller.subscribe();
    pair(&wallet, &dapp, "3").await;
    until_following(&wallet, &dapp).await;

    dapp.controller
        .send(disconnect_message(&dapp, wallet.sdk.beacon_id(), "3"))
        .await
        .unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), wallet_inbox.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(received.origin, Origin::P2P(dapp.sdk.beacon_id().to_string()));
    assert_eq!(received.content.id(), "bye");
}

#[tokio::test]
async fn test_stalled_relay_surfaces_as_connection_failure() {
    let sdk = BeaconSdk::init(
        BeaconConfig::default(),
        Arc::new(InMemoryStorage::new()),
        BlockchainRegistry::passthrough(["tezos"], "tezos"),
    )
    .await
    .unwrap();
    let stalled: Arc<dyn RelayClient> = Arc::new(StalledRelayClient);
    let channel = Arc::new(PeerChannel::new(
        sdk.identity().clone(),
        vec![stalled],
        RelaySelector::new(NODES.iter().map(|n| n.to_string()).collect()),
        PeerChannelConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        },
    ));
    let transport = Arc::new(P2pTransport::new(channel, sdk.storage().clone()));
    let controller = sdk.connection_controller(vec![transport as Arc<dyn Transport>]);

    let peer_key = beacon_crypto::Identity::from_seed("peer").public_key();
    let peer_id = hex::encode(peer_key);
    sdk.storage()
        .add_peers(vec![P2pPeer::new("peer", "peer", &peer_id, NODES[0], "3")])
        .await
        .unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        controller.send(versioned_disconnect(&sdk, &peer_id, "3")),
    )
    .await
    .unwrap()
    .unwrap_err();
    match err {
        ControllerError::Connection(ConnectionException {
            connection_type,
            cause: TransportError::SendFailed(reason),
        }) => {
            assert_eq!(connection_type, ConnectionType::P2p);
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_legacy_pairing_uses_raw_key() {
    let network = InMemoryRelayNetwork::new(NODES);
    let wallet = party(&network, "Wallet", SessionRole::Server, 1).await;
    let dapp = party(&network, "dApp", SessionRole::Client, 1).await;

    let wallet_peer = pair(&wallet, &dapp, "1").await;
    assert_eq!(wallet_peer.public_key, wallet.sdk.beacon_id());
    assert_eq!(wallet_peer.version, "1");
    assert_eq!(wallet_peer.name, "");
    assert_eq!(wallet_peer.relay_server, wallet.channel.own_relay_server().unwrap());
}

#[tokio::test]
async fn test_replicated_delivery_survives_a_failed_relay() {
    let network = InMemoryRelayNetwork::new(NODES);
    let wallet = party(&network, "Wallet", SessionRole::Server, 1).await;
    let dapp = party(&network, "dApp", SessionRole::Client, 3).await;
    pair(&wallet, &dapp, "3").await;

    let wallet_key = wallet.sdk.identity().public_key();
    let first_replica = network.selector().select_for(&wallet_key, Some(0));
    let distinct: std::collections::HashSet<_> = (0..3)
        .map(|i| network.selector().select_for(&wallet_key, Some(i)))
        .collect();
    network.fail_node(&first_replica);

    let mut wallet_inbox = wallet.controller.subscribe();
    until_following(&wallet, &dapp).await;

    let result = dapp
        .controller
        .send(disconnect_message(&dapp, wallet.sdk.beacon_id(), "3"))
        .await;
    if distinct.len() == 1 {
        assert!(result.is_err());
        return;
    }
    result.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), wallet_inbox.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(received.content.id(), "bye");
}

#[tokio::test]
async fn test_send_to_unpaired_peer_fails() {
    let network = InMemoryRelayNetwork::new(NODES);
    let wallet = party(&network, "Wallet", SessionRole::Server, 1).await;

    let err = wallet
        .controller
        .send(disconnect_message(&wallet, &"ef".repeat(32), "3"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("peer not found"));
}

#[tokio::test]
async fn test_relay_servers_come_from_config() {
    let network = InMemoryRelayNetwork::new(NODES);
    let wallet = party(&network, "Wallet", SessionRole::Server, 1).await;
    assert_eq!(wallet.controller.relay_servers().await, NODES.to_vec());
}
