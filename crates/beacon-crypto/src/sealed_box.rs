//! Anonymous sealed boxes for the pairing handshake.
//!
//! A sender seals to the recipient's Ed25519 public key without revealing
//! its own identity: an ephemeral X25519 key agrees a secret with the
//! recipient's converted key, HKDF-SHA256 (salted with both public keys)
//! expands it into an XChaCha20-Poly1305 key and nonce.
//!
//! Output layout: `ephemeral_pk(32) || ciphertext || tag(16)`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand_core::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::Zeroizing;

use crate::convert::{identity_to_x25519, public_key_to_x25519};
use crate::error::CryptoError;
use crate::identity::Identity;
use crate::secret_box::{KEY_BYTES, MAC_BYTES, NONCE_BYTES};

const EPHEMERAL_PK_BYTES: usize = 32;

pub fn encrypt_asymmetric(message: &[u8], recipient_public_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let recipient = public_key_to_x25519(recipient_public_key)?;

    let eph = EphemeralSecret::random_from_rng(OsRng);
    let eph_pub = X25519PublicKey::from(&eph);
    let shared = eph.diffie_hellman(&recipient);
    if !shared.was_contributory() {
        return Err(CryptoError::WeakSharedSecret);
    }

    let (key, nonce) = kdf_key_nonce(shared.as_bytes(), &eph_pub, &recipient)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|_| CryptoError::EncryptionFailed)?;
    let ct = cipher
        .encrypt(XNonce::from_slice(&nonce), message)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(EPHEMERAL_PK_BYTES + ct.len());
    out.extend_from_slice(eph_pub.as_bytes());
    out.extend_from_slice(&ct);
    Ok(out)
}

pub fn decrypt_asymmetric(ciphertext: &[u8], identity: &Identity) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < EPHEMERAL_PK_BYTES + MAC_BYTES {
        return Err(CryptoError::CiphertextTooShort {
            min: EPHEMERAL_PK_BYTES + MAC_BYTES,
            got: ciphertext.len(),
        });
    }

    let (eph_bytes, ct) = ciphertext.split_at(EPHEMERAL_PK_BYTES);
    let mut eph = [0u8; EPHEMERAL_PK_BYTES];
    eph.copy_from_slice(eph_bytes);
    let eph_pub = X25519PublicKey::from(eph);

    let own_secret = identity_to_x25519(identity);
    let own_pub = X25519PublicKey::from(&own_secret);
    let shared = own_secret.diffie_hellman(&eph_pub);
    if !shared.was_contributory() {
        return Err(CryptoError::DecryptionFailed);
    }

    let (key, nonce) =
        kdf_key_nonce(shared.as_bytes(), &eph_pub, &own_pub).map_err(|_| CryptoError::DecryptionFailed)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|_| CryptoError::DecryptionFailed)?;
    cipher
        .decrypt(XNonce::from_slice(&nonce), ct)
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn kdf_key_nonce(
    shared_secret: &[u8; 32],
    eph_pub: &X25519PublicKey,
    recipient: &X25519PublicKey,
) -> Result<(Zeroizing<[u8; KEY_BYTES]>, [u8; NONCE_BYTES]), CryptoError> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(eph_pub.as_bytes());
    salt[32..].copy_from_slice(recipient.as_bytes());
    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);

    let mut key = Zeroizing::new([0u8; KEY_BYTES]);
    hk.expand(b"beacon_sealed_box_key", key.as_mut_slice())
        .map_err(|_| CryptoError::EncryptionFailed)?;
    let mut nonce = [0u8; NONCE_BYTES];
    hk.expand(b"beacon_sealed_box_nonce", &mut nonce)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok((key, nonce))
}
