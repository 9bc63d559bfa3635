//! Merkle error types.

use thiserror::Error;

/// Errors from tree (de)serialization.
#[derive(Debug, Error)]
pub enum MerkleError {
    /// Serialized tree has the wrong length for its depth
    #[error("Serialized tree length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}
