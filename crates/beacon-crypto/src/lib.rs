//! Key material for Beacon peer-to-peer messaging.
//!
//! Everything here operates on raw byte slices so callers can keep keys in
//! whatever encoding their storage uses. Input sizes are validated before
//! any primitive is invoked; failures surface as [`CryptoError`].

#![forbid(unsafe_code)]

pub mod error;
pub mod hash;
pub mod identity;
pub mod convert;
pub mod session_keys;
pub mod sealed_box;
pub mod secret_box;

#[cfg(test)]
mod proptests;

pub use error::CryptoError;
pub use hash::hash;
pub use identity::{generate_seed, sign_detached, verify_detached, Identity};
pub use sealed_box::{decrypt_asymmetric, encrypt_asymmetric};
pub use secret_box::{decrypt_symmetric, encrypt_symmetric, validate_ciphertext_shape};
pub use session_keys::{derive_session_keys, SessionKeyPair, SessionRole};
