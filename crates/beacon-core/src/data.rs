//! Values exchanged between the SDK, its transports and storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::VersionedMessage;

/// Logical source address of a message, independent of the transport that
/// physically delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum Origin {
    #[serde(rename = "website")]
    Website(String),
    #[serde(rename = "extension")]
    Extension(String),
    #[serde(rename = "p2p")]
    P2P(String),
}

impl Origin {
    pub fn id(&self) -> &str {
        match self {
            Origin::Website(id) | Origin::Extension(id) | Origin::P2P(id) => id,
        }
    }

    pub fn for_peer(peer: &P2pPeer) -> Self {
        Origin::P2P(peer.public_key.clone())
    }
}

/// A remote counterparty reachable over the relay network.
///
/// `public_key` is the hex encoded Ed25519 key and identifies the peer for
/// session and relay purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct P2pPeer {
    pub id: String,
    pub name: String,
    pub public_key: String,
    pub relay_server: String,
    #[serde(default = "default_peer_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
    #[serde(default)]
    pub is_paired: bool,
}

fn default_peer_version() -> String {
    "1".to_string()
}

impl P2pPeer {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        public_key: impl Into<String>,
        relay_server: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            public_key: public_key.into(),
            relay_server: relay_server.into(),
            version: version.into(),
            icon: None,
            app_url: None,
            is_paired: false,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = Some(app_url.into());
        self
    }

    pub fn public_key_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.public_key)
    }
}

/// Metadata describing a connected dApp or wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub sender_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_identifier: Option<String>,
}

/// A granted permission. Blockchain specific detail is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub blockchain_identifier: String,
    pub account_id: String,
    pub sender_id: String,
    pub connected_at: u64,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// A payload together with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionMessage<T> {
    pub origin: Origin,
    pub content: T,
}

impl<T> ConnectionMessage<T> {
    pub fn new(origin: Origin, content: T) -> Self {
        Self { origin, content }
    }
}

/// Wire form, as carried by a transport.
pub type SerializedConnectionMessage = ConnectionMessage<String>;

/// Decoded form, as seen above the connection controller.
pub type BeaconConnectionMessage = ConnectionMessage<VersionedMessage>;
