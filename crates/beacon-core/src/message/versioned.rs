//! The revision-tagged envelope and its conversion to the domain model.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{
    BeaconMessage, BlockchainContent, BlockchainMessage, ErrorResponse, LegacyHeader,
    LegacyMessage, MessageError, MessageHeader, Revision, V1Message, V2Message, V3Content,
    V3Message,
};
use crate::blockchain::{BlockchainRegistry, WireMessage};
use crate::data::Origin;

#[derive(Debug, Clone, PartialEq)]
pub enum VersionedMessage {
    V1(V1Message),
    V2(V2Message),
    V3(V3Message),
}

impl VersionedMessage {
    pub fn revision(&self) -> Revision {
        match self {
            VersionedMessage::V1(_) => Revision::V1,
            VersionedMessage::V2(_) => Revision::V2,
            VersionedMessage::V3(_) => Revision::V3,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            VersionedMessage::V1(m) => &m.header().version,
            VersionedMessage::V2(m) => &m.header().version,
            VersionedMessage::V3(m) => &m.version,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            VersionedMessage::V1(m) => &m.header().id,
            VersionedMessage::V2(m) => &m.header().id,
            VersionedMessage::V3(m) => &m.id,
        }
    }

    pub fn sender_id(&self) -> &str {
        match self {
            VersionedMessage::V1(m) => &m.header().sender_id,
            VersionedMessage::V2(m) => &m.header().sender_id,
            VersionedMessage::V3(m) => &m.sender_id,
        }
    }

    // ------------------------------------------------------------------------
    // JSON
    // ------------------------------------------------------------------------

    /// Decode a JSON message, picking the revision from its `version` field.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let Value::Object(map) = value else {
            return Err(MessageError::Json("message is not a JSON object".into()));
        };
        let revision = match map.get("version") {
            Some(Value::String(version)) => Revision::from_version(version)?,
            Some(other) => {
                return Err(MessageError::InvalidField {
                    field: "version",
                    reason: format!("expected string, got {other}"),
                })
            }
            None => return Err(MessageError::MissingField("version")),
        };
        Ok(match revision {
            Revision::V1 => VersionedMessage::V1(V1Message::decode(map)?),
            Revision::V2 => VersionedMessage::V2(V2Message::decode(map)?),
            Revision::V3 => VersionedMessage::V3(V3Message::decode(map)?),
        })
    }

    pub fn to_value(&self) -> Result<Value, MessageError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    // ------------------------------------------------------------------------
    // Domain conversion
    // ------------------------------------------------------------------------

    /// Express `message` in the revision named by its own version.
    pub fn from_beacon_message(
        message: &BeaconMessage,
        registry: &BlockchainRegistry,
    ) -> Result<Self, MessageError> {
        let header = message.header();
        match Revision::from_version(&header.version)? {
            Revision::V1 => {
                let legacy = legacy_header(header);
                Ok(VersionedMessage::V1(match message {
                    BeaconMessage::Request(m) | BeaconMessage::Response(m) => {
                        V1Message::Blockchain(legacy_message(Revision::V1, legacy, m, registry)?)
                    }
                    BeaconMessage::Error(e) => V1Message::Error {
                        header: legacy,
                        error_type: e.error_type.clone(),
                    },
                    BeaconMessage::Disconnect(_) => V1Message::Disconnect(legacy),
                    BeaconMessage::Acknowledge(_) => {
                        return Err(MessageError::UnsupportedMessage {
                            version: header.version.clone(),
                            message_type: message.message_type().to_string(),
                        })
                    }
                }))
            }
            Revision::V2 => {
                let legacy = legacy_header(header);
                Ok(VersionedMessage::V2(match message {
                    BeaconMessage::Request(m) | BeaconMessage::Response(m) => {
                        V2Message::Blockchain(legacy_message(Revision::V2, legacy, m, registry)?)
                    }
                    BeaconMessage::Error(e) => V2Message::Error {
                        header: legacy,
                        error_type: e.error_type.clone(),
                    },
                    BeaconMessage::Disconnect(_) => V2Message::Disconnect(legacy),
                    BeaconMessage::Acknowledge(_) => V2Message::Acknowledge(legacy),
                }))
            }
            Revision::V3 => {
                let content = match message {
                    BeaconMessage::Request(m) | BeaconMessage::Response(m) => {
                        let wire = registry.get(&m.blockchain_identifier)?.to_wire(Revision::V3, m)?;
                        V3Content::Blockchain(BlockchainContent {
                            message_type: wire.message_type,
                            blockchain_identifier: m.blockchain_identifier.clone(),
                            account_id: wire.account_id,
                            blockchain_data: wire.fields,
                        })
                    }
                    BeaconMessage::Error(e) => V3Content::Error {
                        error_type: e.error_type.clone(),
                        description: e.description.clone(),
                    },
                    BeaconMessage::Disconnect(_) => V3Content::Disconnect,
                    BeaconMessage::Acknowledge(_) => V3Content::Acknowledge,
                };
                Ok(VersionedMessage::V3(V3Message {
                    id: header.id.clone(),
                    version: header.version.clone(),
                    sender_id: header.sender_id.clone(),
                    content,
                }))
            }
        }
    }

    /// Convert into the domain model. Native kinds never consult the
    /// registry; blockchain kinds are rebuilt by their strategy.
    pub fn into_beacon_message(
        self,
        origin: Origin,
        destination: Origin,
        registry: &BlockchainRegistry,
    ) -> Result<BeaconMessage, MessageError> {
        match self {
            VersionedMessage::V1(message) => match message {
                V1Message::Error { header, error_type } => Ok(BeaconMessage::Error(ErrorResponse {
                    header: domain_header(header, origin, destination),
                    error_type,
                    description: None,
                })),
                V1Message::Disconnect(header) => Ok(BeaconMessage::Disconnect(domain_header(
                    header,
                    origin,
                    destination,
                ))),
                V1Message::Blockchain(m) => {
                    from_legacy(Revision::V1, m, origin, destination, registry)
                }
            },
            VersionedMessage::V2(message) => match message {
                V2Message::Acknowledge(header) => Ok(BeaconMessage::Acknowledge(domain_header(
                    header,
                    origin,
                    destination,
                ))),
                V2Message::Error { header, error_type } => Ok(BeaconMessage::Error(ErrorResponse {
                    header: domain_header(header, origin, destination),
                    error_type,
                    description: None,
                })),
                V2Message::Disconnect(header) => Ok(BeaconMessage::Disconnect(domain_header(
                    header,
                    origin,
                    destination,
                ))),
                V2Message::Blockchain(m) => {
                    from_legacy(Revision::V2, m, origin, destination, registry)
                }
            },
            VersionedMessage::V3(message) => {
                let header = MessageHeader {
                    id: message.id,
                    version: message.version,
                    sender_id: message.sender_id,
                    origin,
                    destination,
                };
                match message.content {
                    V3Content::Acknowledge => Ok(BeaconMessage::Acknowledge(header)),
                    V3Content::Disconnect => Ok(BeaconMessage::Disconnect(header)),
                    V3Content::Error {
                        error_type,
                        description,
                    } => Ok(BeaconMessage::Error(ErrorResponse {
                        header,
                        error_type,
                        description,
                    })),
                    V3Content::Blockchain(content) => registry
                        .get(&content.blockchain_identifier)?
                        .from_wire(
                            Revision::V3,
                            header,
                            WireMessage {
                                message_type: content.message_type,
                                account_id: content.account_id,
                                fields: content.blockchain_data,
                            },
                        ),
                }
            }
        }
    }
}

fn legacy_header(header: &MessageHeader) -> LegacyHeader {
    LegacyHeader {
        version: header.version.clone(),
        id: header.id.clone(),
        sender_id: header.sender_id.clone(),
    }
}

fn domain_header(header: LegacyHeader, origin: Origin, destination: Origin) -> MessageHeader {
    MessageHeader {
        id: header.id,
        version: header.version,
        sender_id: header.sender_id,
        origin,
        destination,
    }
}

fn legacy_message(
    revision: Revision,
    header: LegacyHeader,
    message: &BlockchainMessage,
    registry: &BlockchainRegistry,
) -> Result<LegacyMessage, MessageError> {
    let wire = registry
        .get(&message.blockchain_identifier)?
        .to_wire(revision, message)?;
    Ok(LegacyMessage {
        header,
        message_type: wire.message_type,
        fields: wire.fields,
    })
}

fn from_legacy(
    revision: Revision,
    message: LegacyMessage,
    origin: Origin,
    destination: Origin,
    registry: &BlockchainRegistry,
) -> Result<BeaconMessage, MessageError> {
    registry.legacy()?.from_wire(
        revision,
        domain_header(message.header, origin, destination),
        WireMessage {
            message_type: message.message_type,
            account_id: None,
            fields: message.fields,
        },
    )
}

impl Serialize for VersionedMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            VersionedMessage::V1(m) => m.serialize(serializer),
            VersionedMessage::V2(m) => m.serialize(serializer),
            VersionedMessage::V3(m) => m.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for VersionedMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        VersionedMessage::from_value(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::{json, Map};

    use super::*;
    use crate::blockchain::{BlockchainCompat, PassthroughCompat};
    use crate::message::ErrorType;

    /// Counts how often the strategy is consulted.
    struct CountingCompat {
        inner: PassthroughCompat,
        calls: AtomicUsize,
    }

    impl BlockchainCompat for CountingCompat {
        fn identifier(&self) -> &str {
            self.inner.identifier()
        }

        fn from_wire(
            &self,
            revision: Revision,
            header: MessageHeader,
            wire: WireMessage,
        ) -> Result<BeaconMessage, MessageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.from_wire(revision, header, wire)
        }

        fn to_wire(
            &self,
            revision: Revision,
            message: &BlockchainMessage,
        ) -> Result<WireMessage, MessageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.to_wire(revision, message)
        }
    }

    fn counting_registry() -> (BlockchainRegistry, Arc<CountingCompat>) {
        let compat = Arc::new(CountingCompat {
            inner: PassthroughCompat::new("tezos"),
            calls: AtomicUsize::new(0),
        });
        let mut registry = BlockchainRegistry::new("tezos");
        registry.register(compat.clone());
        (registry, compat)
    }

    fn header(version: &str) -> MessageHeader {
        MessageHeader {
            id: "0b3c".into(),
            version: version.into(),
            sender_id: "3Lz2".into(),
            origin: Origin::P2P("dapp".into()),
            destination: Origin::P2P("wallet".into()),
        }
    }

    fn request(version: &str) -> BeaconMessage {
        let mut payload = Map::new();
        payload.insert("network".into(), json!({"type": "mainnet"}));
        payload.insert("scopes".into(), json!(["sign"]));
        BeaconMessage::Request(BlockchainMessage {
            header: header(version),
            blockchain_identifier: "tezos".into(),
            message_type: "permission_request".into(),
            account_id: None,
            payload,
        })
    }

    fn round_trip(message: &BeaconMessage, registry: &BlockchainRegistry) -> BeaconMessage {
        let wire = VersionedMessage::from_beacon_message(message, registry)
            .unwrap()
            .to_json()
            .unwrap();
        VersionedMessage::from_json(&wire)
            .unwrap()
            .into_beacon_message(
                message.header().origin.clone(),
                message.header().destination.clone(),
                registry,
            )
            .unwrap()
    }

    #[test]
    fn test_round_trip_version_2_request() {
        let (registry, _) = counting_registry();
        let message = request("2.0.0");
        assert_eq!(round_trip(&message, &registry), message);
    }

    #[test]
    fn test_round_trip_every_revision() {
        let registry = BlockchainRegistry::passthrough(["tezos"], "tezos");
        for version in ["1", "2.0.0", "3"] {
            let message = request(version);
            assert_eq!(round_trip(&message, &registry), message, "version {version}");
            let disconnect = BeaconMessage::Disconnect(header(version));
            assert_eq!(round_trip(&disconnect, &registry), disconnect);
        }
    }

    #[test]
    fn test_v1_error_decodes_natively() {
        let (registry, compat) = counting_registry();
        let json = r#"{"type":"error","version":"1","id":"1","beaconId":"s","errorType":"ABORTED_ERROR"}"#;
        let message = VersionedMessage::from_json(json)
            .unwrap()
            .into_beacon_message(Origin::P2P("a".into()), Origin::P2P("b".into()), &registry)
            .unwrap();
        match message {
            BeaconMessage::Error(e) => assert_eq!(e.error_type, ErrorType::Aborted),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(compat.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_v1_blockchain_message_uses_legacy_strategy() {
        let (registry, compat) = counting_registry();
        let json = r#"{"type":"sign_payload_request","version":"1","id":"1","beaconId":"s","payload":"05"}"#;
        let message = VersionedMessage::from_json(json)
            .unwrap()
            .into_beacon_message(Origin::P2P("a".into()), Origin::P2P("b".into()), &registry)
            .unwrap();
        assert!(matches!(message, BeaconMessage::Request(_)));
        assert_eq!(compat.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_v1_rejects_acknowledge() {
        let registry = BlockchainRegistry::passthrough(["tezos"], "tezos");
        let ack = BeaconMessage::Acknowledge(header("1"));
        assert_eq!(
            VersionedMessage::from_beacon_message(&ack, &registry),
            Err(MessageError::UnsupportedMessage {
                version: "1".into(),
                message_type: "acknowledge".into(),
            })
        );
    }

    #[test]
    fn test_unknown_version_is_unsupported() {
        let json = r#"{"type":"acknowledge","version":"4","id":"1","senderId":"s"}"#;
        assert_eq!(
            VersionedMessage::from_json(json),
            Err(MessageError::UnsupportedVersion("4".into()))
        );
        let registry = BlockchainRegistry::passthrough(["tezos"], "tezos");
        assert!(matches!(
            VersionedMessage::from_beacon_message(&request("4.1"), &registry),
            Err(MessageError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_missing_version_and_non_object() {
        assert_eq!(
            VersionedMessage::from_json(r#"{"type":"disconnect"}"#),
            Err(MessageError::MissingField("version"))
        );
        assert!(matches!(
            VersionedMessage::from_json("[1,2]"),
            Err(MessageError::Json(_))
        ));
        assert!(matches!(
            VersionedMessage::from_json("not json"),
            Err(MessageError::Json(_))
        ));
    }

    #[test]
    fn test_v3_unknown_blockchain() {
        let registry = BlockchainRegistry::passthrough(["tezos"], "tezos");
        let json = r#"{"id":"1","version":"3","senderId":"s","message":{"type":"blockchain_request","blockchainIdentifier":"bitcoin","blockchainData":{}}}"#;
        let result = VersionedMessage::from_json(json)
            .unwrap()
            .into_beacon_message(Origin::P2P("a".into()), Origin::P2P("b".into()), &registry);
        assert_eq!(result, Err(MessageError::UnknownBlockchain("bitcoin".into())));
    }

    #[test]
    fn test_serde_impls_match_json_helpers() {
        let registry = BlockchainRegistry::passthrough(["tezos"], "tezos");
        let versioned = VersionedMessage::from_beacon_message(&request("3"), &registry).unwrap();
        let via_serde = serde_json::to_value(&versioned).unwrap();
        assert_eq!(via_serde, versioned.to_value().unwrap());
        let back: VersionedMessage = serde_json::from_value(via_serde).unwrap();
        assert_eq!(back, versioned);
        assert_eq!(back.sender_id(), "3Lz2");
        assert_eq!(back.revision(), Revision::V3);
    }
}
