//! Relay-backed peer-to-peer channel.
//!
//! Two parties agree on relay nodes without talking to each other by
//! hashing their public keys against the shared node pool, exchange a
//! sealed pairing payload through a channel-open marker, and from then on
//! exchange messages encrypted with directional session keys. Every
//! message is published to several relays for delivery robustness.

#![forbid(unsafe_code)]

pub mod error;
pub mod relay;
pub mod selector;
pub mod session;
pub mod communicator;
pub mod client;
pub mod transport;
pub mod testing;

#[cfg(test)]
mod proptests;

pub use client::{P2pClient, PeerChannel, PeerChannelConfig};
pub use error::P2pError;
pub use relay::{RelayClient, RelayError, RelayEvent};
pub use selector::RelaySelector;
pub use session::SessionManager;
pub use transport::P2pTransport;
