//! Beacon demo CLI entry point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use beacon_core::blockchain::BlockchainRegistry;
use beacon_core::config::BeaconConfig;
use beacon_core::message::{BeaconMessage, BlockchainMessage, MessageHeader, VersionedMessage};
use beacon_core::sdk::PROTOCOL_VERSION;
use beacon_core::storage::InMemoryStorage;
use beacon_core::{
    identifier, BeaconConnectionMessage, BeaconSdk, ConnectionController, CoreError, Origin,
    P2pPeer, Transport,
};
use beacon_crypto::{Identity, SessionRole};
use beacon_p2p::testing::InMemoryRelayNetwork;
use beacon_p2p::{P2pTransport, PeerChannel, PeerChannelConfig, RelayClient};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::{json, Map};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SEND_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "beacon-demo")]
#[command(version, about = "Beacon peer-to-peer messaging demo")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Debug mode (protocol-level tracing)
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pair a wallet with a dApp and exchange a permission request
    Pair {
        /// Protocol version advertised by the dApp
        #[arg(long, default_value = "3")]
        peer_version: String,

        /// Relays each message is published to
        #[arg(long)]
        replication: Option<usize>,
    },
    /// Print the identifiers derived from a seed
    Identity {
        #[arg(long)]
        seed: String,
    },
    /// Write the default configuration
    InitConfig {
        #[arg(long, default_value = "beacon.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BeaconConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BeaconConfig::default(),
    };

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Command::Pair {
            peer_version,
            replication,
        } => {
            let mut config = config;
            if let Some(replication) = replication {
                config.p2p.replication_count = replication;
            }
            run_pairing(config, &peer_version).await
        }
        Command::Identity { seed } => {
            let identity = Identity::from_seed(&seed);
            let public_key = identity.public_key();
            println!("PUBLIC_KEY_HEX={}", identifier::beacon_id(&public_key));
            println!("SENDER_ID={}", identifier::sender_id(&public_key)?);
            Ok(())
        }
        Command::InitConfig { path } => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            std::fs::write(&path, config.to_toml_string()?)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

struct Party {
    sdk: BeaconSdk,
    channel: Arc<PeerChannel>,
    transport: Arc<P2pTransport>,
    controller: ConnectionController,
}

async fn party(
    network: &InMemoryRelayNetwork,
    mut config: BeaconConfig,
    name: &str,
    role: SessionRole,
) -> anyhow::Result<Party> {
    config.app.name = name.to_string();
    let registry = BlockchainRegistry::passthrough(
        config.messaging.blockchains.clone(),
        config.messaging.compat_blockchain.clone(),
    );
    let sdk = BeaconSdk::init(config, Arc::new(InMemoryStorage::new()), registry).await?;

    let relay: Arc<dyn RelayClient> = network.client(&sdk.identity().public_key());
    let channel = Arc::new(PeerChannel::new(
        sdk.identity().clone(),
        vec![relay],
        network.selector(),
        PeerChannelConfig::from_config(sdk.config(), role),
    ));
    let transport = Arc::new(P2pTransport::new(channel.clone(), sdk.storage().clone()));
    let controller = sdk.connection_controller(vec![transport.clone() as Arc<dyn Transport>]);
    Ok(Party {
        sdk,
        channel,
        transport,
        controller,
    })
}

async fn run_pairing(config: BeaconConfig, peer_version: &str) -> anyhow::Result<()> {
    let network = InMemoryRelayNetwork::new(config.p2p.relay_nodes.clone());
    let wallet = party(&network, config.clone(), "Demo Wallet", SessionRole::Server).await?;
    let dapp = party(&network, config.clone(), "Demo dApp", SessionRole::Client).await?;
    let timeout = config.p2p.timeout();

    println!("WALLET={}", wallet.sdk.beacon_id());
    println!("DAPP={}", dapp.sdk.beacon_id());

    // The dApp advertises itself out of band; the wallet answers over the relay.
    let dapp_peer = P2pPeer::new(
        "demo-pairing",
        dapp.sdk.config().app.name.clone(),
        dapp.channel.public_key_hex(),
        dapp.channel.own_relay_server()?,
        peer_version,
    );
    let mut wallet_inbox = wallet.controller.subscribe();
    let mut openings = dapp.controller.start_open_channel_listener();
    wallet.transport.pair(dapp_peer).await?;

    let wallet_peer = tokio::time::timeout(timeout, openings.next())
        .await
        .context("timed out waiting for the pairing response")?
        .context("channel-opening stream ended")??;
    println!(
        "PAIRED name={:?} version={} relay={}",
        wallet_peer.name, wallet_peer.version, wallet_peer.relay_server
    );
    dapp.transport.accept(wallet_peer).await?;

    let dapp_key = dapp.sdk.identity().public_key();
    tokio::time::timeout(timeout, async {
        while !wallet.channel.is_subscribed(&dapp_key) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("timed out waiting for the wallet to follow the dApp")?;

    let request = permission_request(&dapp, wallet.sdk.beacon_id());
    let versioned = VersionedMessage::from_beacon_message(&request, dapp.sdk.registry())?;
    send_with_retry(
        &dapp.controller,
        BeaconConnectionMessage::new(request.header().destination.clone(), versioned),
    )
    .await?;
    info!(id = request.id(), "permission request sent");

    let received = tokio::time::timeout(timeout, wallet_inbox.next())
        .await
        .context("timed out waiting for the request")?
        .context("inbound stream ended")??;
    let message = received.content.into_beacon_message(
        received.origin,
        Origin::P2P(wallet.sdk.beacon_id().to_string()),
        wallet.sdk.registry(),
    )?;
    println!(
        "RECEIVED type={} id={} from={}",
        message.message_type(),
        message.id(),
        message.header().origin.id()
    );
    Ok(())
}

/// Send, retrying failures that may clear up on their own.
async fn send_with_retry(
    controller: &ConnectionController,
    message: BeaconConnectionMessage,
) -> Result<(), CoreError> {
    let mut attempt = 1;
    loop {
        match controller.send(message.clone()).await.map_err(CoreError::from) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < SEND_ATTEMPTS => {
                warn!(attempt, error = %e, "send failed, retrying");
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn permission_request(dapp: &Party, wallet: &str) -> BeaconMessage {
    let mut payload = Map::new();
    payload.insert("appMetadata".into(), json!({
        "senderId": dapp.sdk.sender_id(),
        "name": dapp.sdk.config().app.name,
    }));
    payload.insert("scopes".into(), json!(["operation_request", "sign"]));
    BeaconMessage::Request(BlockchainMessage {
        header: MessageHeader {
            id: "demo-request".into(),
            version: PROTOCOL_VERSION.to_string(),
            sender_id: dapp.sdk.sender_id().to_string(),
            origin: Origin::P2P(dapp.sdk.beacon_id().to_string()),
            destination: Origin::P2P(wallet.to_string()),
        },
        blockchain_identifier: dapp.sdk.config().messaging.compat_blockchain.clone(),
        message_type: "permission_request".into(),
        account_id: None,
        payload,
    })
}
