//! Revision 1: flat messages addressed by `beaconId`.
//!
//! Only `error` and `disconnect` are understood natively; every other kind
//! is blockchain specific. Acknowledgements did not exist yet.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{has_native_type, ErrorType, LegacyHeader, LegacyMessage, MessageError};

const NATIVE_TYPES: [&str; 2] = ["error", "disconnect"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "Wire")]
pub enum V1Message {
    Error {
        header: LegacyHeader,
        error_type: ErrorType,
    },
    Disconnect(LegacyHeader),
    Blockchain(LegacyMessage),
}

impl V1Message {
    pub fn header(&self) -> &LegacyHeader {
        match self {
            V1Message::Error { header, .. } | V1Message::Disconnect(header) => header,
            V1Message::Blockchain(m) => &m.header,
        }
    }

    pub(crate) fn decode(map: Map<String, Value>) -> Result<Self, MessageError> {
        let native = has_native_type(&map, &NATIVE_TYPES);
        let value = Value::Object(map);
        if !native {
            return Ok(V1Message::Blockchain(serde_json::from_value::<Flat>(value)?.into()));
        }
        Ok(match serde_json::from_value::<Native>(value)? {
            Native::Error(body) => V1Message::Error {
                header: body.header.into(),
                error_type: body.error_type,
            },
            Native::Disconnect(header) => V1Message::Disconnect(header.into()),
        })
    }
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Serialize, Deserialize)]
struct Header {
    version: String,
    id: String,
    #[serde(rename = "beaconId")]
    beacon_id: String,
}

#[derive(Serialize, Deserialize)]
struct ErrorBody {
    #[serde(flatten)]
    header: Header,
    #[serde(rename = "errorType")]
    error_type: ErrorType,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Native {
    Error(ErrorBody),
    Disconnect(Header),
}

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
            sender_id: h.beacon_id,
        }
    }
}

impl From<LegacyHeader> for Header {
    fn from(h: LegacyHeader) -> Self {
        Self {
            version: h.version,
            id: h.id,
            beacon_id: h.sender_id,
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

impl From<V1Message> for Wire {
    fn from(message: V1Message) -> Self {
        match message {
            V1Message::Error { header, error_type } => Wire::Native(Native::Error(ErrorBody {
                header: header.into(),
                error_type,
            })),
            V1Message::Disconnect(header) => Wire::Native(Native::Disconnect(header.into())),
            V1Message::Blockchain(m) => Wire::Flat(Flat {
                message_type: m.message_type,
                header: m.header.into(),
                fields: m.fields,
            }),
        }
    }
}
