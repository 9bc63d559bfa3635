//! # Shared Types Crate
//!
//! Cross-subsystem value types for BlockVault: block geometry constants,
//! `BlockId`/`Hash` aliases, timestamps, and the ciphertext envelope that
//! travels between client, server, and Merkle tree.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every byte layout shared by two subsystems
//!   (envelope framing, timestamp width) is defined here, nowhere else.
//! - **Fixed geometry**: the block size and tree depth are compile-time
//!   constants; the total block count is fixed at store initialization.

pub mod entities;
pub mod envelope;

pub use entities::*;
pub use envelope::BlockEnvelope;
