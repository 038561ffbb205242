//! Beacon Core - the transport-independent half of the Beacon messaging layer.
//!
//! This crate implements:
//! - The data model shared by every transport (peers, origins, envelopes)
//! - Versioned wire messages and their conversion to the domain model
//! - The blockchain compatibility registry
//! - The connection controller fanning messages across transports
//! - Storage abstraction and the explicit SDK context

#![forbid(unsafe_code)]

// Data model
pub mod data;
pub mod message;
pub mod blockchain;
pub mod identifier;

// Services
pub mod transport;
pub mod controller;
pub mod sdk;

// Infrastructure
pub mod storage;
pub mod config;

// Supporting modules
pub mod errors;
pub mod testing;

pub use controller::ConnectionController;
pub use data::{
    AppMetadata, BeaconConnectionMessage, ConnectionMessage, Origin, P2pPeer, Permission,
    SerializedConnectionMessage,
};
pub use errors::CoreError;
pub use sdk::BeaconSdk;
pub use transport::{ConnectionType, Transport, TransportError};
