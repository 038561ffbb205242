//! Versioned wire messages.
//!
//! Three protocol revisions coexist on the wire. Decoding looks at the
//! `version` field first and only then decodes the revision specific shape;
//! blockchain specific payloads are handed to the blockchain compatibility
//! strategy registered for them.

use serde_json::{Map, Value};
use thiserror::Error;

pub mod beacon;
pub mod serializer;
pub mod v1;
pub mod v2;
pub mod v3;
pub mod versioned;

#[cfg(test)]
mod proptests;

pub use beacon::{BeaconMessage, BlockchainMessage, ErrorResponse, ErrorType, MessageHeader};
pub use serializer::{Base58CheckProvider, JsonProvider, Serializer, SerializerProvider};
pub use v1::V1Message;
pub use v2::V2Message;
pub use v3::{BlockchainContent, V3Content, V3Message};
pub use versioned::VersionedMessage;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("unsupported message version: {0}")]
    UnsupportedVersion(String),

    #[error("message type {message_type} is not supported in version {version}")]
    UnsupportedMessage {
        version: String,
        message_type: String,
    },

    #[error("no compatibility strategy registered for blockchain {0}")]
    UnknownBlockchain(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for MessageError {
    fn from(e: serde_json::Error) -> Self {
        MessageError::Json(e.to_string())
    }
}

// ============================================================================
// Revisions
// ============================================================================

/// A wire-format generation of the envelope, inferred from the leading
/// component of a message's `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Revision {
    V1,
    V2,
    V3,
}

impl Revision {
    pub fn from_version(version: &str) -> Result<Self, MessageError> {
        match version.split('.').next().unwrap_or_default().trim() {
            "1" => Ok(Revision::V1),
            "2" => Ok(Revision::V2),
            "3" => Ok(Revision::V3),
            _ => Err(MessageError::UnsupportedVersion(version.to_string())),
        }
    }
}

// ============================================================================
// Legacy (revision 1 and 2) shapes
// ============================================================================

/// Header common to the flat revision 1 and 2 messages.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyHeader {
    pub version: String,
    pub id: String,
    /// `beaconId` in revision 1, `senderId` in revision 2.
    pub sender_id: String,
}

/// A flat revision 1 or 2 message whose remaining fields belong to a
/// blockchain compatibility strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyMessage {
    pub header: LegacyHeader,
    pub message_type: String,
    pub fields: Map<String, Value>,
}

/// Whether a flat message's `type` is one of `native`.
pub(crate) fn has_native_type(map: &Map<String, Value>, native: &[&str]) -> bool {
    matches!(map.get("type"), Some(Value::String(t)) if native.contains(&t.as_str()))
}
