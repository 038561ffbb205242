//! Directional session key derivation.
//!
//! Both parties convert their Ed25519 keys to X25519, compute the shared
//! point `q` and hash `q || client_pk || server_pk` with BLAKE2b-512. The
//! 64-byte result is split in two halves whose assignment depends on the
//! role, so the client's `tx` is the server's `rx` and vice versa.

use blake2::{Blake2b512, Digest};
use constant_time_eq::constant_time_eq;
use x25519_dalek::PublicKey as X25519PublicKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::convert::{identity_to_x25519, public_key_to_x25519};
use crate::error::CryptoError;
use crate::identity::Identity;

pub const SESSION_KEY_BYTES: usize = 32;

/// Which side of the exchange the local party plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Client,
    Server,
}

/// Two directional symmetric keys for one peer.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeyPair {
    tx: [u8; SESSION_KEY_BYTES],
    rx: [u8; SESSION_KEY_BYTES],
}

impl SessionKeyPair {
    pub fn new(tx: [u8; SESSION_KEY_BYTES], rx: [u8; SESSION_KEY_BYTES]) -> Self {
        Self { tx, rx }
    }

    /// Key for messages sent to the peer.
    pub fn tx(&self) -> &[u8; SESSION_KEY_BYTES] {
        &self.tx
    }

    /// Key for messages received from the peer.
    pub fn rx(&self) -> &[u8; SESSION_KEY_BYTES] {
        &self.rx
    }
}

impl PartialEq for SessionKeyPair {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.tx, &other.tx) & constant_time_eq(&self.rx, &other.rx)
    }
}

impl Eq for SessionKeyPair {}

impl std::fmt::Debug for SessionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKeyPair(..)")
    }
}

/// Derive the session keys shared with `peer_public_key` (Ed25519, 32 bytes).
pub fn derive_session_keys(
    role: SessionRole,
    identity: &Identity,
    peer_public_key: &[u8],
) -> Result<SessionKeyPair, CryptoError> {
    let peer = public_key_to_x25519(peer_public_key)?;
    let own_secret = identity_to_x25519(identity);
    let own = public_key_to_x25519(&identity.public_key())?;

    let shared = own_secret.diffie_hellman(&peer);
    if !shared.was_contributory() {
        return Err(CryptoError::WeakSharedSecret);
    }

    let (client_pk, server_pk): (&X25519PublicKey, &X25519PublicKey) = match role {
        SessionRole::Client => (&own, &peer),
        SessionRole::Server => (&peer, &own),
    };

    let mut keys = Blake2b512::new()
        .chain_update(shared.as_bytes())
        .chain_update(client_pk.as_bytes())
        .chain_update(server_pk.as_bytes())
        .finalize();

    let mut first = [0u8; SESSION_KEY_BYTES];
    let mut second = [0u8; SESSION_KEY_BYTES];
    first.copy_from_slice(&keys[..SESSION_KEY_BYTES]);
    second.copy_from_slice(&keys[SESSION_KEY_BYTES..]);
    keys.as_mut_slice().zeroize();

    Ok(match role {
        SessionRole::Client => SessionKeyPair::new(second, first),
        SessionRole::Server => SessionKeyPair::new(first, second),
    })
}
