//! Addresses, channel-open markers and pairing payloads.

use beacon_core::P2pPeer;
use beacon_crypto::hash::hash32;
use serde::{Deserialize, Serialize};

use crate::error::P2pError;
use crate::relay::RelayEvent;

pub const CHANNEL_OPEN_PREFIX: &str = "@channel-open";
pub const PAIRING_RESPONSE_TYPE: &str = "p2p-pairing-response";

/// `@<hex(hash(public_key))>`, the node independent part of a mailbox address.
pub fn mailbox_prefix(public_key: &[u8]) -> String {
    format!("@{}", hex::encode(hash32(public_key)))
}

/// Full mailbox address of `public_key` on `relay_server`.
pub fn recipient_identifier(public_key: &[u8], relay_server: &str) -> String {
    format!("{}:{relay_server}", mailbox_prefix(public_key))
}

pub fn is_message_from(event: &RelayEvent, public_key: &[u8]) -> bool {
    event.sender.starts_with(&mailbox_prefix(public_key))
}

pub fn channel_opening_message(recipient: &str, payload: &str) -> String {
    format!("{CHANNEL_OPEN_PREFIX}:{recipient}:{payload}")
}

/// Split a channel-open marker into its recipient address and payload.
pub fn parse_channel_opening(message: &str) -> Option<(&str, &str)> {
    let rest = message.strip_prefix(CHANNEL_OPEN_PREFIX)?.strip_prefix(':')?;
    let (recipient, payload) = rest.rsplit_once(':')?;
    if recipient.is_empty() || payload.is_empty() {
        return None;
    }
    Some((recipient, payload))
}

/// Structured pairing payload used by peers on protocol 2 and later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct P2pPairingResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub version: String,
    pub public_key: String,
    pub relay_server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
}

/// How the local party presents itself when pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub name: String,
    pub icon: Option<String>,
    pub app_url: Option<String>,
    /// Hex encoded public key.
    pub public_key: String,
}

fn is_legacy_version(version: &str) -> bool {
    version.split('.').next().unwrap_or_default().trim() == "1"
}

/// Payload answering `peer`'s pairing request. Peers on a `1.x` version get
/// the bare hex public key; every other version gets the structured form,
/// echoing the peer's version.
pub fn pairing_payload(peer: &P2pPeer, app: &AppIdentity, relay_server: &str) -> Result<String, P2pError> {
    if is_legacy_version(&peer.version) {
        return Ok(app.public_key.clone());
    }
    let response = P2pPairingResponse {
        id: peer.id.clone(),
        kind: PAIRING_RESPONSE_TYPE.to_string(),
        name: app.name.clone(),
        version: peer.version.clone(),
        public_key: app.public_key.clone(),
        relay_server: relay_server.to_string(),
        icon: app.icon.clone(),
        app_url: app.app_url.clone(),
    };
    serde_json::to_string(&response).map_err(|e| P2pError::InvalidPairingPayload(e.to_string()))
}

/// Rebuild the peer described by a received pairing payload. A bare hex
/// key is the legacy form; its relay server comes from the sender address.
pub fn parse_pairing_payload(payload: &str, sender: &str) -> Result<P2pPeer, P2pError> {
    let trimmed = payload.trim();
    if trimmed.starts_with('{') {
        let response: P2pPairingResponse = serde_json::from_str(trimmed)
            .map_err(|e| P2pError::InvalidPairingPayload(e.to_string()))?;
        validate_public_key(&response.public_key)?;
        let mut peer = P2pPeer::new(
            response.id,
            response.name,
            response.public_key,
            response.relay_server,
            response.version,
        );
        peer.icon = response.icon;
        peer.app_url = response.app_url;
        return Ok(peer);
    }

    validate_public_key(trimmed)?;
    let relay_server = sender
        .split_once(':')
        .map(|(_, node)| node)
        .filter(|node| !node.is_empty())
        .ok_or_else(|| P2pError::InvalidPairingPayload(format!("sender without relay server: {sender}")))?;
    Ok(P2pPeer::new(trimmed, "", trimmed, relay_server, "1"))
}

fn validate_public_key(public_key: &str) -> Result<(), P2pError> {
    match hex::decode(public_key) {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => Err(P2pError::InvalidPeerKey(public_key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppIdentity {
        AppIdentity {
            name: "Wallet".into(),
            icon: None,
            app_url: None,
            public_key: "abcd".into(),
        }
    }

    fn peer(version: &str) -> P2pPeer {
        P2pPeer::new("peer-id", "dApp", "ff".repeat(32), "node", version)
    }

    #[test]
    fn test_recipient_identifier_format() {
        let pk = [1u8; 32];
        let id = recipient_identifier(&pk, "beacon-node-1.sky.papers.tech");
        assert_eq!(
            id,
            format!("@{}:beacon-node-1.sky.papers.tech", hex::encode(hash32(&pk)))
        );
        assert!(id.starts_with(&mailbox_prefix(&pk)));
    }

    #[test]
    fn test_is_message_from() {
        let pk = [2u8; 32];
        let event = |sender: String| RelayEvent {
            node: "n".into(),
            room: "!r:n".into(),
            sender,
            message: String::new(),
        };
        assert!(is_message_from(&event(recipient_identifier(&pk, "n")), &pk));
        assert!(!is_message_from(&event(recipient_identifier(&[3u8; 32], "n")), &pk));
    }

    #[test]
    fn test_channel_opening_round_trip() {
        let recipient = recipient_identifier(&[4u8; 32], "node:8448");
        let message = channel_opening_message(&recipient, "deadbeef");
        assert!(message.starts_with("@channel-open:@"));
        assert_eq!(parse_channel_opening(&message), Some((recipient.as_str(), "deadbeef")));
        assert_eq!(parse_channel_opening("hello"), None);
        assert_eq!(parse_channel_opening("@channel-open:nopayload"), None);
    }

    #[test]
    fn test_pairing_payload_structured() {
        let payload = pairing_payload(&peer("2.0.0"), &app(), "relay").unwrap();
        assert!(payload.contains(r#""version":"2.0.0""#));
        assert!(payload.contains(r#""publicKey":"abcd""#));
        assert!(payload.contains(r#""type":"p2p-pairing-response""#));
        assert!(!payload.contains("icon"));
    }

    #[test]
    fn test_pairing_payload_legacy() {
        assert_eq!(pairing_payload(&peer("1.2"), &app(), "relay").unwrap(), "abcd");
        assert_eq!(pairing_payload(&peer("1"), &app(), "relay").unwrap(), "abcd");
        assert_eq!(pairing_payload(&peer("1.abc"), &app(), "relay").unwrap(), "abcd");
    }

    #[test]
    fn test_pairing_payload_echoes_unknown_versions() {
        for version in ["2", "2.abc", "3", "7.1"] {
            let payload = pairing_payload(&peer(version), &app(), "relay").unwrap();
            let response: P2pPairingResponse = serde_json::from_str(&payload).unwrap();
            assert_eq!(response.version, version);
            assert_eq!(response.id, "peer-id");
            assert_eq!(response.relay_server, "relay");
        }
    }

    #[test]
    fn test_parse_structured_payload() {
        let mut app = app();
        app.public_key = "11".repeat(32);
        app.icon = Some("icon".into());
        let payload = pairing_payload(&peer("3"), &app, "relay").unwrap();
        let parsed = parse_pairing_payload(&payload, "@x:other").unwrap();
        assert_eq!(parsed.public_key, "11".repeat(32));
        assert_eq!(parsed.relay_server, "relay");
        assert_eq!(parsed.version, "3");
        assert_eq!(parsed.icon.as_deref(), Some("icon"));
    }

    #[test]
    fn test_parse_legacy_payload() {
        let key = "22".repeat(32);
        let parsed = parse_pairing_payload(&key, "@abc:node.example:8448").unwrap();
        assert_eq!(parsed.public_key, key);
        assert_eq!(parsed.relay_server, "node.example:8448");
        assert_eq!(parsed.version, "1");
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        assert!(matches!(
            parse_pairing_payload("abcd", "@a:n"),
            Err(P2pError::InvalidPeerKey(_))
        ));
        assert!(matches!(
            parse_pairing_payload("{not json", "@a:n"),
            Err(P2pError::InvalidPairingPayload(_))
        ));
        assert!(matches!(
            parse_pairing_payload(&"33".repeat(32), "@a"),
            Err(P2pError::InvalidPairingPayload(_))
        ));
    }
}
