//! Long-term Ed25519 identity.
//!
//! An identity is derived deterministically from a textual seed: the seed's
//! UTF-8 bytes are hashed to 32 bytes with BLAKE2b and used as the Ed25519
//! secret seed. The private key is exposed in the 64-byte `seed || public`
//! layout so it can be handed to [`sign_detached`].

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, KEYPAIR_LENGTH};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{check_len, CryptoError};
use crate::hash::hash32;

pub const PUBLIC_KEY_BYTES: usize = 32;
pub const PRIVATE_KEY_BYTES: usize = KEYPAIR_LENGTH;
pub const SIGNATURE_BYTES: usize = 64;

/// Number of random bytes behind a freshly generated seed.
const SEED_ENTROPY_BYTES: usize = 16;

/// A long-term signing identity. Key material is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    #[zeroize(skip)] // SigningKey zeroizes itself
    sign_key: SigningKey,
}

impl Identity {
    /// Derive the identity for `seed`. The same seed always yields the same keys.
    pub fn from_seed(seed: &str) -> Self {
        let secret = Zeroizing::new(hash32(seed.as_bytes()));
        Self {
            sign_key: SigningKey::from_bytes(&secret),
        }
    }

    /// Rebuild an identity from a 64-byte `seed || public` private key.
    pub fn from_private_key(private_key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            sign_key: signing_key_from_private(private_key)?,
        })
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_BYTES] {
        self.sign_key.verifying_key().to_bytes()
    }

    /// The 64-byte private key (`seed || public`).
    pub fn private_key(&self) -> Zeroizing<[u8; PRIVATE_KEY_BYTES]> {
        Zeroizing::new(self.sign_key.to_keypair_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_BYTES] {
        let signature: Signature = self.sign_key.sign(message);
        signature.to_bytes()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.sign_key
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

/// Generate a fresh random seed in `8-4-4-4-12` hex group form.
pub fn generate_seed() -> Result<String, CryptoError> {
    let mut bytes = Zeroizing::new([0u8; SEED_ENTROPY_BYTES]);
    getrandom::getrandom(&mut bytes[..]).map_err(|_| CryptoError::RngError)?;
    let hex = hex::encode(&bytes[..]);
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

/// Produce a detached Ed25519 signature with a 64-byte private key.
pub fn sign_detached(
    message: &[u8],
    private_key: &[u8],
) -> Result<[u8; SIGNATURE_BYTES], CryptoError> {
    let sign_key = signing_key_from_private(private_key)?;
    let signature: Signature = sign_key.sign(message);
    Ok(signature.to_bytes())
}

/// Verify a detached Ed25519 signature.
pub fn verify_detached(
    message: &[u8],
    signature: &[u8],
    public_key: &[u8],
) -> Result<(), CryptoError> {
    check_len(public_key, PUBLIC_KEY_BYTES)?;
    check_len(signature, SIGNATURE_BYTES)?;

    let mut pk = [0u8; PUBLIC_KEY_BYTES];
    pk.copy_from_slice(public_key);
    let verifying_key = VerifyingKey::from_bytes(&pk).map_err(|_| CryptoError::InvalidPublicKey)?;

    let mut sig = [0u8; SIGNATURE_BYTES];
    sig.copy_from_slice(signature);
    verifying_key
        .verify_strict(message, &Signature::from_bytes(&sig))
        .map_err(|_| CryptoError::InvalidSignature)
}

fn signing_key_from_private(private_key: &[u8]) -> Result<SigningKey, CryptoError> {
    check_len(private_key, PRIVATE_KEY_BYTES)?;
    let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_BYTES]);
    bytes.copy_from_slice(private_key);
    SigningKey::from_keypair_bytes(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}
