//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Sealing a block failed
    #[error("Sealing failed: {0}")]
    SealFailed(String),

    /// Opening a block failed (tag mismatch or corrupted envelope)
    #[error("Opening failed: envelope did not authenticate")]
    OpenFailed,

    /// Key derivation failed
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
}
