//! The current in-memory message model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::Origin;

/// Error codes carried by error responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorType {
    Aborted,
    BadRequest,
    NotGranted,
    Unknown,
    /// Blockchain specific error code.
    Other(String),
}

impl From<String> for ErrorType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ABORTED_ERROR" => ErrorType::Aborted,
            "BAD_REQUEST_ERROR" => ErrorType::BadRequest,
            "NOT_GRANTED_ERROR" => ErrorType::NotGranted,
            "UNKNOWN_ERROR" => ErrorType::Unknown,
            _ => ErrorType::Other(s),
        }
    }
}

impl From<ErrorType> for String {
    fn from(e: ErrorType) -> Self {
        match e {
            ErrorType::Aborted => "ABORTED_ERROR".into(),
            ErrorType::BadRequest => "BAD_REQUEST_ERROR".into(),
            ErrorType::NotGranted => "NOT_GRANTED_ERROR".into(),
            ErrorType::Unknown => "UNKNOWN_ERROR".into(),
            ErrorType::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub id: String,
    pub version: String,
    pub sender_id: String,
    pub origin: Origin,
    pub destination: Origin,
}

/// A request or response owned by a blockchain. The payload stays opaque
/// to the core and is interpreted by the blockchain's compatibility strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockchainMessage {
    pub header: MessageHeader,
    pub blockchain_identifier: String,
    pub message_type: String,
    pub account_id: Option<String>,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub header: MessageHeader,
    pub error_type: ErrorType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BeaconMessage {
    Request(BlockchainMessage),
    Response(BlockchainMessage),
    Acknowledge(MessageHeader),
    Error(ErrorResponse),
    Disconnect(MessageHeader),
}

impl BeaconMessage {
    pub fn header(&self) -> &MessageHeader {
        match self {
            BeaconMessage::Request(m) | BeaconMessage::Response(m) => &m.header,
            BeaconMessage::Error(e) => &e.header,
            BeaconMessage::Acknowledge(h) | BeaconMessage::Disconnect(h) => h,
        }
    }

    pub fn id(&self) -> &str {
        &self.header().id
    }

    pub fn version(&self) -> &str {
        &self.header().version
    }

    /// Wire name of the message kind.
    pub fn message_type(&self) -> &str {
        match self {
            BeaconMessage::Request(m) | BeaconMessage::Response(m) => &m.message_type,
            BeaconMessage::Acknowledge(_) => "acknowledge",
            BeaconMessage::Error(_) => "error",
            BeaconMessage::Disconnect(_) => "disconnect",
        }
    }
}
