//! # Password Key Derivation
//!
//! Argon2id stretching of the user password into the 256-bit session key.
//!
//! The salt is deliberately fixed (all zeros): the key must be a pure
//! function of the password so the same store can be reopened in a later
//! session. The flip side is that rekeying requires rewriting the whole
//! store, and identical passwords on different stores derive identical
//! keys.

use argon2::Argon2;

use crate::{CryptoError, SecretKey};

/// Fixed all-zero salt; see the module docs for why this is deliberate.
const KDF_SALT: [u8; 16] = [0u8; 16];

/// Stretch `password` into the session key with Argon2id at the default
/// (interactive) cost parameters.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivationFailed` if the KDF rejects its
/// inputs (it accepts the empty password).
pub fn derive_key(password: &str) -> Result<SecretKey, CryptoError> {
    let mut key = [0u8; 32];

    Argon2::default()
        .hash_password_into(password.as_bytes(), &KDF_SALT, &mut key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(SecretKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_per_password() {
        let k1 = derive_key("password123").unwrap();
        let k2 = derive_key("password123").unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_passwords_differ() {
        let k1 = derive_key("alpha").unwrap();
        let k2 = derive_key("beta").unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_empty_password_is_accepted() {
        // The client defaults --pass to the empty string.
        derive_key("").unwrap();
    }
}
