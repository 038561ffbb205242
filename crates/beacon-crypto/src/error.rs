/// Error type for all key material operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid hash output size: {0}")]
    InvalidHashSize(usize),
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("key exchange produced a non-contributory shared secret")]
    WeakSharedSecret,
    #[error("ciphertext too short: need at least {min} bytes, got {got}")]
    CiphertextTooShort { min: usize, got: usize },
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("RNG failed")]
    RngError,
}

pub(crate) fn check_len(bytes: &[u8], expected: usize) -> Result<(), CryptoError> {
    if bytes.len() != expected {
        return Err(CryptoError::InvalidKeyLength {
            expected,
            got: bytes.len(),
        });
    }
    Ok(())
}
