//! # SHA-256 Hashing
//!
//! Digest helpers for the Merkle layer: leaf hashes over full envelopes and
//! internal-node hashes over concatenated child pairs.

use sha2::{Digest, Sha256};
use shared_types::{BlockEnvelope, Hash};

/// Hash a byte string with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash two child nodes together.
///
/// Input order is always left ‖ right, never sorted; sorting would let a
/// sibling swap produce the same parent.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Merkle leaf preimage: the full envelope, ciphertext ‖ tag ‖ nonce.
///
/// Hashed incrementally so the envelope never needs to be reassembled into
/// one buffer.
pub fn envelope_digest(env: &BlockEnvelope) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(env.data);
    hasher.update(env.tag);
    hasher.update(env.nonce);
    hasher.finalize().into()
}
