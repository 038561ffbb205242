//! Text encoding of versioned messages on the wire.
//!
//! Messages are rendered as JSON and then passed through a
//! [`SerializerProvider`]. The default provider wraps the JSON bytes in
//! base58check, the encoding peers expect on relay transports.

use std::sync::Arc;

use super::{MessageError, VersionedMessage};

pub trait SerializerProvider: Send + Sync {
    fn encode(&self, bytes: &[u8]) -> Result<String, MessageError>;
    fn decode(&self, text: &str) -> Result<Vec<u8>, MessageError>;
}

/// Base58 with a 4-byte double SHA-256 checksum.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base58CheckProvider;

impl SerializerProvider for Base58CheckProvider {
    fn encode(&self, bytes: &[u8]) -> Result<String, MessageError> {
        Ok(bs58::encode(bytes).with_check().into_string())
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, MessageError> {
        bs58::decode(text)
            .with_check(None)
            .into_vec()
            .map_err(|e| MessageError::Encoding(e.to_string()))
    }
}

/// Plain JSON text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonProvider;

impl SerializerProvider for JsonProvider {
    fn encode(&self, bytes: &[u8]) -> Result<String, MessageError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| MessageError::Encoding(e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, MessageError> {
        Ok(text.as_bytes().to_vec())
    }
}

#[derive(Clone)]
pub struct Serializer {
    provider: Arc<dyn SerializerProvider>,
}

impl Serializer {
    pub fn new(provider: Arc<dyn SerializerProvider>) -> Self {
        Self { provider }
    }

    /// Pick a provider by its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "base58check" => Some(Self::new(Arc::new(Base58CheckProvider))),
            "json" => Some(Self::new(Arc::new(JsonProvider))),
            _ => None,
        }
    }

    pub fn serialize(&self, message: &VersionedMessage) -> Result<String, MessageError> {
        self.provider.encode(message.to_json()?.as_bytes())
    }

    pub fn deserialize(&self, text: &str) -> Result<VersionedMessage, MessageError> {
        let bytes = self.provider.decode(text)?;
        let json = std::str::from_utf8(&bytes).map_err(|e| MessageError::Encoding(e.to_string()))?;
        VersionedMessage::from_json(json)
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(Arc::new(Base58CheckProvider))
    }
}

impl std::fmt::Debug for Serializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializer").finish_non_exhaustive()
    }
}
