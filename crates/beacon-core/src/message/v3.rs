//! Revision 3: a fixed header with the kind specific content nested under
//! `message`. Blockchain content names its blockchain explicitly.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{has_native_type, ErrorType, MessageError};

const NATIVE_TYPES: [&str; 3] = ["acknowledge", "error", "disconnect"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V3Message {
    pub id: String,
    pub version: String,
    pub sender_id: String,
    #[serde(rename = "message")]
    pub content: V3Content,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "ContentWire")]
pub enum V3Content {
    Acknowledge,
    Error {
        error_type: ErrorType,
        description: Option<String>,
    },
    Disconnect,
    Blockchain(BlockchainContent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainContent {
    #[serde(rename = "type")]
    pub message_type: String,
    pub blockchain_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub blockchain_data: Map<String, Value>,
}

impl V3Message {
    pub(crate) fn decode(map: Map<String, Value>) -> Result<Self, MessageError> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum NativeContent {
    Acknowledge,
    #[serde(rename_all = "camelCase")]
    Error {
        error_type: ErrorType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Disconnect,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ContentWire {
    Native(NativeContent),
    Blockchain(BlockchainContent),
}

impl From<V3Content> for ContentWire {
    fn from(content: V3Content) -> Self {
        match content {
            V3Content::Acknowledge => ContentWire::Native(NativeContent::Acknowledge),
            V3Content::Error {
                error_type,
                description,
            } => ContentWire::Native(NativeContent::Error {
                error_type,
                description,
            }),
            V3Content::Disconnect => ContentWire::Native(NativeContent::Disconnect),
            V3Content::Blockchain(content) => ContentWire::Blockchain(content),
        }
    }
}

impl<'de> Deserialize<'de> for V3Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        let native = has_native_type(&map, &NATIVE_TYPES);
        let value = Value::Object(map);
        if !native {
            return BlockchainContent::deserialize(value)
                .map(V3Content::Blockchain)
                .map_err(de::Error::custom);
        }
        Ok(match NativeContent::deserialize(value).map_err(de::Error::custom)? {
            NativeContent::Acknowledge => V3Content::Acknowledge,
            NativeContent::Error {
                error_type,
                description,
            } => V3Content::Error {
                error_type,
                description,
            },
            NativeContent::Disconnect => V3Content::Disconnect,
        })
    }
}
