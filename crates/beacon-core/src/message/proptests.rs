#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    use crate::blockchain::BlockchainRegistry;
    use crate::data::Origin;
    use crate::message::{
        BeaconMessage, BlockchainMessage, ErrorResponse, ErrorType, MessageHeader, Serializer,
        VersionedMessage,
    };

    fn header(id: String, version: &str, sender_id: String) -> MessageHeader {
        MessageHeader {
            id,
            version: version.to_string(),
            sender_id,
            origin: Origin::P2P("origin".into()),
            destination: Origin::P2P("destination".into()),
        }
    }

    fn payload() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map("[a-z]{1,8}", "[ -~]{0,16}", 0..6).prop_map(|m| {
            m.into_iter()
                .filter(|(k, _)| !matches!(k.as_str(), "id" | "type" | "version"))
                .map(|(k, v)| (k, Value::String(v)))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_blockchain_round_trip(
            id in "[a-f0-9]{8}",
            sender in "[1-9A-Za-z]{4,12}",
            version in prop::sample::select(vec!["1", "2.0.0", "3"]),
            is_response in any::<bool>(),
            account_id in prop::option::of("[a-z0-9]{6}"),
            payload in payload(),
        ) {
            let registry = BlockchainRegistry::passthrough(["tezos"], "tezos");
            let kind = if is_response { "operation_response" } else { "operation_request" };
            let message = BlockchainMessage {
                header: header(id, version, sender),
                blockchain_identifier: "tezos".into(),
                message_type: kind.into(),
                account_id,
                payload,
            };
            let message = if is_response {
                BeaconMessage::Response(message)
            } else {
                BeaconMessage::Request(message)
            };

            let serializer = Serializer::default();
            let wire = serializer
                .serialize(&VersionedMessage::from_beacon_message(&message, &registry).unwrap())
                .unwrap();
            let decoded = serializer
                .deserialize(&wire)
                .unwrap()
                .into_beacon_message(
                    Origin::P2P("origin".into()),
                    Origin::P2P("destination".into()),
                    &registry,
                )
                .unwrap();
            prop_assert_eq!(decoded, message);
        }

        #[test]
        fn test_v3_error_round_trip(
            id in "[a-f0-9]{8}",
            description in prop::option::of("[ -~]{0,24}"),
        ) {
            let registry = BlockchainRegistry::passthrough(["tezos"], "tezos");
            let message = BeaconMessage::Error(ErrorResponse {
                header: header(id, "3", "sender".into()),
                error_type: ErrorType::NotGranted,
                description,
            });
            let json = VersionedMessage::from_beacon_message(&message, &registry).unwrap().to_json().unwrap();
            let decoded = VersionedMessage::from_json(&json)
                .unwrap()
                .into_beacon_message(
                    Origin::P2P("origin".into()),
                    Origin::P2P("destination".into()),
                    &registry,
                )
                .unwrap();
            prop_assert_eq!(decoded, message);
        }
    }
}
