//! The relay network collaborator.
//!
//! Relay nodes are untrusted mailboxes. A client can resolve a room for a
//! recipient address, publish text into it, and observe the events of the
//! rooms it belongs to.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("relay node unavailable: {0}")]
    Unavailable(String),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("event stream failed: {0}")]
    Stream(String),
}

/// A text message observed in one of the client's rooms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub node: String,
    pub room: String,
    /// Mailbox address of the author, `@<hash>:<node>`.
    pub sender: String,
    pub message: String,
}

pub type RelayEventStream = BoxStream<'static, Result<RelayEvent, RelayError>>;

#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Resolve the room shared with `recipient`, creating it when needed.
    async fn create_or_join_room(&self, recipient: &str) -> Result<String, RelayError>;

    async fn publish(&self, room: &str, message: &str) -> Result<(), RelayError>;

    /// Events of every room the client belongs to, from now on.
    fn events(&self) -> RelayEventStream;
}
