//! # Shared Crypto Crate
//!
//! Cryptographic primitives for BlockVault:
//!
//! - AES-256-GCM sealing/opening of one plaintext block into the
//!   ciphertext envelope (detached tag, in-place).
//! - Argon2id password stretching into the session key.
//! - SHA-256 hashing for Merkle leaves and internal nodes.
//!
//! All primitives are consumed as black boxes from the RustCrypto crates;
//! this crate only fixes parameters and layouts.

pub mod errors;
pub mod hashing;
pub mod kdf;
pub mod symmetric;

pub use errors::CryptoError;
pub use hashing::{envelope_digest, hash_pair, sha256};
pub use kdf::derive_key;
pub use symmetric::{open_block, seal_block, SecretKey, SessionNonce};
