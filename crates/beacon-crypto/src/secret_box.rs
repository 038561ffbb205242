//! Symmetric authenticated encryption with XChaCha20-Poly1305.
//!
//! Output layout: `nonce(24) || ciphertext || tag(16)`. The nonce is random
//! per message.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};

use crate::error::{check_len, CryptoError};

pub const KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 24;
pub const MAC_BYTES: usize = 16;

pub fn encrypt_symmetric(message: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_len(key, KEY_BYTES)?;

    let mut nonce = [0u8; NONCE_BYTES];
    getrandom::getrandom(&mut nonce).map_err(|_| CryptoError::RngError)?;

    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::EncryptionFailed)?;
    let ct = cipher
        .encrypt(XNonce::from_slice(&nonce), message)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_BYTES + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

pub fn decrypt_symmetric(blob: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_len(key, KEY_BYTES)?;
    if blob.len() < NONCE_BYTES + MAC_BYTES {
        return Err(CryptoError::CiphertextTooShort {
            min: NONCE_BYTES + MAC_BYTES,
            got: blob.len(),
        });
    }

    let (nonce, ct) = blob.split_at(NONCE_BYTES);
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::DecryptionFailed)?;
    cipher
        .decrypt(XNonce::from_slice(nonce), ct)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Cheap pre-filter for inbound relay text: hex encoded and long enough
/// to hold a nonce and a tag.
pub fn validate_ciphertext_shape(text: &str) -> bool {
    text.len() % 2 == 0
        && text.len() >= (NONCE_BYTES + MAC_BYTES) * 2
        && text.bytes().all(|b| b.is_ascii_hexdigit())
}
