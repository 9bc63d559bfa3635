//! # Symmetric Encryption
//!
//! AES-256-GCM sealing and opening of one plaintext block, in place with a
//! detached tag, so the envelope layout (ciphertext ‖ tag ‖ nonce) never
//! requires an intermediate allocation.
//!
//! ## Security Properties
//!
//! - 256-bit key, 12-byte nonce, 16-byte tag.
//! - The session key is derived from the user password with a fixed salt
//!   (see [`crate::kdf`]); one random nonce is drawn per session and stamped
//!   on every write of that session. Reusing a key across sessions without
//!   reinitializing the store therefore reuses (key, nonce) pairs — a store
//!   must never be rekeyed in place.

use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce, Tag};
use shared_types::{BlockBuf, BlockEnvelope, BLOCK_SIZE, NONCE_LEN};
use zeroize::Zeroize;

use crate::CryptoError;

/// Session secret key (256-bit), zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Per-session write nonce.
///
/// Drawn once at client startup and reused for every write performed in
/// that session; see the module docs for the caveat this carries.
#[derive(Clone)]
pub struct SessionNonce([u8; NONCE_LEN]);

impl SessionNonce {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Seal one plaintext block into an envelope under `nonce`.
///
/// # Errors
///
/// Returns `CryptoError::SealFailed` if encryption fails.
pub fn seal_block(
    key: &SecretKey,
    nonce: &SessionNonce,
    plaintext: &BlockBuf,
) -> Result<BlockEnvelope, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let mut env = BlockEnvelope::zeroed();
    env.data.copy_from_slice(plaintext);
    env.nonce.copy_from_slice(nonce.as_bytes());

    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&env.nonce), &[], &mut env.data)
        .map_err(|e| CryptoError::SealFailed(e.to_string()))?;
    env.tag.copy_from_slice(tag.as_slice());

    Ok(env)
}

/// Open an envelope back into plaintext using the nonce it carries.
///
/// # Errors
///
/// Returns `CryptoError::OpenFailed` on any tag mismatch. A failure here
/// after Merkle verification passed means the password (key) is wrong or
/// the store was written under a different key.
pub fn open_block(key: &SecretKey, env: &BlockEnvelope) -> Result<BlockBuf, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let mut plaintext = [0u8; BLOCK_SIZE];
    plaintext.copy_from_slice(&env.data);

    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&env.nonce),
            &[],
            &mut plaintext,
            Tag::from_slice(&env.tag),
        )
        .map_err(|_| CryptoError::OpenFailed)?;

    Ok(plaintext)
}
