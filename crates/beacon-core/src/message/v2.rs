//! Revision 2: flat messages addressed by `senderId`, with native
//! acknowledge, error and disconnect.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{has_native_type, ErrorType, LegacyHeader, LegacyMessage, MessageError};

const NATIVE_TYPES: [&str; 3] = ["acknowledge", "error", "disconnect"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "Wire")]
pub enum V2Message {
    Acknowledge(LegacyHeader),
    Error {
        header: LegacyHeader,
        error_type: ErrorType,
    },
    Disconnect(LegacyHeader),
    Blockchain(LegacyMessage),
}

impl V2Message {
    pub fn header(&self) -> &LegacyHeader {
        match self {
            V2Message::Acknowledge(header)
            | V2Message::Error { header, .. }
            | V2Message::Disconnect(header) => header,
            V2Message::Blockchain(m) => &m.header,
        }
    }

    pub(crate) fn decode(map: Map<String, Value>) -> Result<Self, MessageError> {
        let native = has_native_type(&map, &NATIVE_TYPES);
        let value = Value::Object(map);
        if !native {
            return Ok(V2Message::Blockchain(serde_json::from_value::<Flat>(value)?.into()));
        }
        Ok(match serde_json::from_value::<Native>(value)? {
            Native::Acknowledge(header) => V2Message::Acknowledge(header.into()),
            Native::Error(body) => V2Message::Error {
                header: body.header.into(),
                error_type: body.error_type,
            },
            Native::Disconnect(header) => V2Message::Disconnect(header.into()),
        })
    }
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    version: String,
    id: String,
    sender_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(flatten)]
    header: Header,
    error_type: ErrorType,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Native {
    Acknowledge(Header),
    Error(ErrorBody),
    Disconnect(Header),
}

/// A blockchain message: header, `type` and opaque remaining fields.
#[derive(Serialize, Deserialize)]
struct Flat {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(flatten)]
    header: Header,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Wire {
    Native(Native),
    Flat(Flat),
}

impl From<Header> for LegacyHeader {
    fn from(h: Header) -> Self {
        Self {
            version: h.version,
            id: h.id,
            sender_id: h.sender_id,
        }
    }
}

impl From<LegacyHeader> for Header {
    fn from(h: LegacyHeader) -> Self {
        Self {
            version: h.version,
            id: h.id,
            sender_id: h.sender_id,
        }
    }
}

impl From<Flat> for LegacyMessage {
    fn from(f: Flat) -> Self {
        Self {
            header: f.header.into(),
            message_type: f.message_type,
            fields: f.fields,
        }
    }
}

impl From<V2Message> for Wire {
    fn from(message: V2Message) -> Self {
        match message {
            V2Message::Acknowledge(header) => Wire::Native(Native::Acknowledge(header.into())),
            V2Message::Error { header, error_type } => Wire::Native(Native::Error(ErrorBody {
                header: header.into(),
                error_type,
            })),
            V2Message::Disconnect(header) => Wire::Native(Native::Disconnect(header.into())),
            V2Message::Blockchain(m) => Wire::Flat(Flat {
                message_type: m.message_type,
                header: m.header.into(),
                fields: m.fields,
            }),
        }
    }
}
