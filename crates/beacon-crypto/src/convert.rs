//! Ed25519 to X25519 key conversion.

use ed25519_dalek::VerifyingKey;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{check_len, CryptoError};
use crate::identity::{Identity, PUBLIC_KEY_BYTES};

/// Map an Ed25519 public key onto its Montgomery (X25519) form.
pub fn public_key_to_x25519(public_key: &[u8]) -> Result<X25519PublicKey, CryptoError> {
    check_len(public_key, PUBLIC_KEY_BYTES)?;
    let mut pk = [0u8; PUBLIC_KEY_BYTES];
    pk.copy_from_slice(public_key);
    let verifying_key = VerifyingKey::from_bytes(&pk).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(X25519PublicKey::from(verifying_key.to_montgomery().to_bytes()))
}

/// X25519 secret matching [`public_key_to_x25519`] of the identity's public key.
pub fn identity_to_x25519(identity: &Identity) -> StaticSecret {
    StaticSecret::from(identity.signing_key().to_scalar_bytes())
}
