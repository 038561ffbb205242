//! Public identifiers derived from keys.

use beacon_crypto::{hash, CryptoError};

const SENDER_ID_HASH_BYTES: usize = 5;

/// Short, human-shareable identifier of a public key:
/// base58check of the 5-byte BLAKE2b digest.
pub fn sender_id(public_key: &[u8]) -> Result<String, CryptoError> {
    let digest = hash(public_key, SENDER_ID_HASH_BYTES)?;
    Ok(bs58::encode(digest).with_check().into_string())
}

/// Hex encoded public key, the identifier peers address each other with.
pub fn beacon_id(public_key: &[u8]) -> String {
    hex::encode(public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_crypto::Identity;

    #[test]
    fn test_sender_id_is_stable() {
        let identity = Identity::from_seed("sender");
        let a = sender_id(&identity.public_key()).unwrap();
        let b = sender_id(&identity.public_key()).unwrap();
        assert_eq!(a, b);
        let decoded = bs58::decode(&a).with_check(None).into_vec().unwrap();
        assert_eq!(decoded.len(), SENDER_ID_HASH_BYTES);
    }

    #[test]
    fn test_sender_ids_differ_per_key() {
        let a = sender_id(&Identity::from_seed("a").public_key()).unwrap();
        let b = sender_id(&Identity::from_seed("b").public_key()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_beacon_id_is_hex() {
        assert_eq!(beacon_id(&[0xab, 0x01]), "ab01");
    }
}
