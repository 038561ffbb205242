use blake2::digest::consts::U32;
use blake2::digest::{Digest, Update, VariableOutput};
use blake2::{Blake2b, Blake2bVar};

use crate::error::CryptoError;

/// Largest output BLAKE2b can produce.
pub const MAX_HASH_BYTES: usize = 64;

/// Generic BLAKE2b hash with a caller-chosen output size (1..=64 bytes).
pub fn hash(message: &[u8], output_size: usize) -> Result<Vec<u8>, CryptoError> {
    if output_size == 0 || output_size > MAX_HASH_BYTES {
        return Err(CryptoError::InvalidHashSize(output_size));
    }
    let mut hasher =
        Blake2bVar::new(output_size).map_err(|_| CryptoError::InvalidHashSize(output_size))?;
    hasher.update(message);
    let mut out = vec![0u8; output_size];
    hasher
        .finalize_variable(&mut out)
        .map_err(|_| CryptoError::InvalidHashSize(output_size))?;
    Ok(out)
}

/// 32-byte BLAKE2b digest, the size used for addressing and relay selection.
pub fn hash32(message: &[u8]) -> [u8; 32] {
    Blake2b::<U32>::digest(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_output_sizes() {
        assert_eq!(hash(b"beacon", 5).unwrap().len(), 5);
        assert_eq!(hash(b"beacon", 32).unwrap().len(), 32);
        assert_eq!(hash(b"beacon", 64).unwrap().len(), 64);
    }

    #[test]
    fn test_hash_rejects_bad_sizes() {
        assert_eq!(hash(b"x", 0), Err(CryptoError::InvalidHashSize(0)));
        assert_eq!(hash(b"x", 65), Err(CryptoError::InvalidHashSize(65)));
    }

    #[test]
    fn test_hash32_matches_generic_hash() {
        assert_eq!(hash32(b"abc").to_vec(), hash(b"abc", 32).unwrap());
    }

    #[test]
    fn test_blake2b_known_vector() {
        // BLAKE2b-512("abc")
        let expected = "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d1\
                        7d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923";
        assert_eq!(hex::encode(hash(b"abc", 64).unwrap()), expected);
    }

    #[test]
    fn test_different_sizes_are_not_prefixes() {
        let short = hash(b"abc", 32).unwrap();
        let long = hash(b"abc", 64).unwrap();
        assert_ne!(short[..], long[..32]);
    }
}
