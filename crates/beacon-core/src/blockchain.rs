//! Blockchain compatibility strategies.
//!
//! Each blockchain contributes a strategy that translates between its
//! payloads on the wire and the domain [`BlockchainMessage`]. Strategies are
//! registered once at startup in a [`BlockchainRegistry`]; revisions 1 and 2
//! carry no blockchain identifier, so the registry also names the strategy
//! used for them.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::message::{
    BeaconMessage, BlockchainMessage, MessageError, MessageHeader, Revision,
};

/// Blockchain specific part of a message as it appears on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub message_type: String,
    /// Only revision 3 carries the account outside the blockchain fields.
    pub account_id: Option<String>,
    pub fields: Map<String, Value>,
}

pub trait BlockchainCompat: Send + Sync {
    fn identifier(&self) -> &str;

    /// Rebuild a domain message from the wire fields of `revision`.
    fn from_wire(
        &self,
        revision: Revision,
        header: MessageHeader,
        wire: WireMessage,
    ) -> Result<BeaconMessage, MessageError>;

    /// Express a domain message in the wire fields of `revision`.
    fn to_wire(
        &self,
        revision: Revision,
        message: &BlockchainMessage,
    ) -> Result<WireMessage, MessageError>;
}

// ============================================================================
// Registry
// ============================================================================

/// Registration table of compatibility strategies, keyed by blockchain
/// identifier.
pub struct BlockchainRegistry {
    strategies: HashMap<String, Arc<dyn BlockchainCompat>>,
    legacy: String,
}

impl BlockchainRegistry {
    /// Create an empty registry whose revision 1/2 messages belong to `legacy`.
    pub fn new(legacy: impl Into<String>) -> Self {
        Self {
            strategies: HashMap::new(),
            legacy: legacy.into(),
        }
    }

    /// Registry with a [`PassthroughCompat`] for every identifier.
    pub fn passthrough<I, S>(identifiers: I, legacy: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new(legacy);
        for identifier in identifiers {
            registry.register(Arc::new(PassthroughCompat::new(identifier)));
        }
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn BlockchainCompat>) -> &mut Self {
        self.strategies
            .insert(strategy.identifier().to_string(), strategy);
        self
    }

    pub fn get(&self, identifier: &str) -> Result<Arc<dyn BlockchainCompat>, MessageError> {
        self.strategies
            .get(identifier)
            .cloned()
            .ok_or_else(|| MessageError::UnknownBlockchain(identifier.to_string()))
    }

    /// Strategy for the revisions that predate blockchain identifiers.
    pub fn legacy(&self) -> Result<Arc<dyn BlockchainCompat>, MessageError> {
        self.get(&self.legacy)
    }

    pub fn legacy_identifier(&self) -> &str {
        &self.legacy
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.strategies.contains_key(identifier)
    }

    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.strategies.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for BlockchainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainRegistry")
            .field("strategies", &self.identifiers())
            .field("legacy", &self.legacy)
            .finish()
    }
}

// ============================================================================
// Passthrough strategy
// ============================================================================

/// Keeps blockchain payloads opaque. `*_request` kinds become requests and
/// `*_response` kinds become responses.
#[derive(Debug, Clone)]
pub struct PassthroughCompat {
    identifier: String,
}

impl PassthroughCompat {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

impl BlockchainCompat for PassthroughCompat {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn from_wire(
        &self,
        revision: Revision,
        header: MessageHeader,
        wire: WireMessage,
    ) -> Result<BeaconMessage, MessageError> {
        let WireMessage {
            message_type,
            account_id,
            mut fields,
        } = wire;

        let account_id = match revision {
            Revision::V3 => account_id,
            Revision::V1 | Revision::V2 => match fields.remove("accountId") {
                Some(Value::String(s)) => Some(s),
                Some(other) => {
                    return Err(MessageError::InvalidField {
                        field: "accountId",
                        reason: format!("expected string, got {other}"),
                    })
                }
                None => None,
            },
        };

        let is_response = message_type.ends_with("_response");
        if !is_response && !message_type.ends_with("_request") {
            return Err(MessageError::UnsupportedMessage {
                version: header.version,
                message_type,
            });
        }

        let message = BlockchainMessage {
            header,
            blockchain_identifier: self.identifier.clone(),
            message_type,
            account_id,
            payload: fields,
        };
        Ok(if is_response {
            BeaconMessage::Response(message)
        } else {
            BeaconMessage::Request(message)
        })
    }

    fn to_wire(
        &self,
        revision: Revision,
        message: &BlockchainMessage,
    ) -> Result<WireMessage, MessageError> {
        let mut fields = message.payload.clone();
        let account_id = match revision {
            Revision::V3 => message.account_id.clone(),
            Revision::V1 | Revision::V2 => {
                if let Some(account_id) = &message.account_id {
                    fields.insert("accountId".into(), Value::String(account_id.clone()));
                }
                None
            }
        };
        Ok(WireMessage {
            message_type: message.message_type.clone(),
            account_id,
            fields,
        })
    }
}
