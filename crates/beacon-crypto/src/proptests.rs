#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::hash::hash;
    use crate::identity::{sign_detached, verify_detached, Identity};
    use crate::sealed_box::{decrypt_asymmetric, encrypt_asymmetric};
    use crate::secret_box::{decrypt_symmetric, encrypt_symmetric, validate_ciphertext_shape};
    use crate::session_keys::{derive_session_keys, SessionRole};

    proptest! {
        #[test]
        fn test_identity_is_deterministic(seed in ".{0,64}") {
            let a = Identity::from_seed(&seed);
            let b = Identity::from_seed(&seed);
            prop_assert_eq!(a.public_key(), b.public_key());
        }

        #[test]
        fn test_hash_is_deterministic(data in any::<Vec<u8>>(), size in 1usize..=64) {
            let h1 = hash(&data, size).unwrap();
            let h2 = hash(&data, size).unwrap();
            prop_assert_eq!(h1.len(), size);
            prop_assert_eq!(h1, h2);
        }

        #[test]
        fn test_session_keys_cross_match(client_seed in "[a-z0-9]{1,24}", server_seed in "[A-Z0-9]{1,24}") {
            let client = Identity::from_seed(&client_seed);
            let server = Identity::from_seed(&server_seed);

            let c = derive_session_keys(SessionRole::Client, &client, &server.public_key()).unwrap();
            let s = derive_session_keys(SessionRole::Server, &server, &client.public_key()).unwrap();

            prop_assert_eq!(c.tx(), s.rx());
            prop_assert_eq!(c.rx(), s.tx());
        }

        #[test]
        fn test_session_encryption_round_trip(message in any::<Vec<u8>>()) {
            let client = Identity::from_seed("client");
            let server = Identity::from_seed("server");
            let c = derive_session_keys(SessionRole::Client, &client, &server.public_key()).unwrap();
            let s = derive_session_keys(SessionRole::Server, &server, &client.public_key()).unwrap();

            let blob = encrypt_symmetric(&message, c.tx()).unwrap();
            prop_assert!(validate_ciphertext_shape(&hex::encode(&blob)));
            prop_assert_eq!(decrypt_symmetric(&blob, s.rx()).unwrap(), message.clone());
            prop_assert!(decrypt_symmetric(&blob, s.tx()).is_err());
        }

        #[test]
        fn test_sealed_box_round_trip(message in any::<Vec<u8>>()) {
            let recipient = Identity::from_seed("recipient");
            let sealed = encrypt_asymmetric(&message, &recipient.public_key()).unwrap();
            prop_assert_eq!(decrypt_asymmetric(&sealed, &recipient).unwrap(), message);
        }

        #[test]
        fn test_signature_round_trip(seed in ".{0,32}", message in any::<Vec<u8>>()) {
            let identity = Identity::from_seed(&seed);
            let sig = sign_detached(&message, &identity.private_key()[..]).unwrap();
            prop_assert!(verify_detached(&message, &sig, &identity.public_key()).is_ok());
        }

        #[test]
        fn test_shape_rejects_non_hex(text in "[g-z]{80,120}") {
            prop_assert!(!validate_ciphertext_shape(&text));
        }
    }
}
