//! # Ciphertext Envelope
//!
//! The unit the server stores and the wire carries: one block's ciphertext
//! plus the AEAD tag and nonce that authenticate it. The envelope is also
//! the Merkle leaf preimage — leaf `i` is the hash of the full envelope at
//! block id `i`, so the tree binds ciphertext, tag, and nonce together.
//!
//! ## Wire / Disk Layout
//!
//! ```text
//! Bytes 0..4096      ciphertext (plaintext-sized)
//! Bytes 4096..4112   AEAD tag (16)
//! Bytes 4112..4124   AEAD nonce (12)
//! ```
//!
//! The server splits the same layout across its `data` (ciphertext) and
//! `aead` (tag ‖ nonce) files.

use crate::entities::{BLOCK_SIZE, NONCE_LEN, TAG_LEN};

/// Serialized envelope length: ciphertext ‖ tag ‖ nonce.
pub const ENVELOPE_LEN: usize = BLOCK_SIZE + TAG_LEN + NONCE_LEN;

/// Tag ‖ nonce extras length (one slot of the server's `aead` file).
pub const EXTRAS_LEN: usize = TAG_LEN + NONCE_LEN;

/// One block's ciphertext together with its AEAD tag and nonce.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockEnvelope {
    /// Ciphertext (same length as the plaintext block).
    pub data: [u8; BLOCK_SIZE],
    /// AEAD authentication tag.
    pub tag: [u8; TAG_LEN],
    /// AEAD nonce the ciphertext was sealed under.
    pub nonce: [u8; NONCE_LEN],
}

impl BlockEnvelope {
    /// The all-zero envelope: the state of every untouched block.
    pub fn zeroed() -> Self {
        Self {
            data: [0u8; BLOCK_SIZE],
            tag: [0u8; TAG_LEN],
            nonce: [0u8; NONCE_LEN],
        }
    }

    /// True when every byte is zero. The server answers NoData for such
    /// slots instead of shipping a known-plaintext envelope.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
            && self.tag.iter().all(|&b| b == 0)
            && self.nonce.iter().all(|&b| b == 0)
    }

    /// Serialize into the wire layout.
    pub fn to_bytes(&self) -> [u8; ENVELOPE_LEN] {
        let mut out = [0u8; ENVELOPE_LEN];
        out[..BLOCK_SIZE].copy_from_slice(&self.data);
        out[BLOCK_SIZE..BLOCK_SIZE + TAG_LEN].copy_from_slice(&self.tag);
        out[BLOCK_SIZE + TAG_LEN..].copy_from_slice(&self.nonce);
        out
    }

    /// Parse from the wire layout.
    pub fn from_bytes(bytes: &[u8; ENVELOPE_LEN]) -> Self {
        let mut env = Self::zeroed();
        env.data.copy_from_slice(&bytes[..BLOCK_SIZE]);
        env.tag
            .copy_from_slice(&bytes[BLOCK_SIZE..BLOCK_SIZE + TAG_LEN]);
        env.nonce.copy_from_slice(&bytes[BLOCK_SIZE + TAG_LEN..]);
        env
    }

    /// The tag ‖ nonce extras as stored in the server's `aead` file.
    pub fn extras(&self) -> [u8; EXTRAS_LEN] {
        let mut out = [0u8; EXTRAS_LEN];
        out[..TAG_LEN].copy_from_slice(&self.tag);
        out[TAG_LEN..].copy_from_slice(&self.nonce);
        out
    }

    /// Rebuild an envelope from a `data` slot and an `aead` slot.
    pub fn from_parts(data: &[u8; BLOCK_SIZE], extras: &[u8; EXTRAS_LEN]) -> Self {
        let mut env = Self::zeroed();
        env.data.copy_from_slice(data);
        env.tag.copy_from_slice(&extras[..TAG_LEN]);
        env.nonce.copy_from_slice(&extras[TAG_LEN..]);
        env
    }
}

impl std::fmt::Debug for BlockEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockEnvelope")
            .field("data", &format_args!("[{} bytes]", BLOCK_SIZE))
            .field("tag", &self.tag)
            .field("nonce", &self.nonce)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_is_zero() {
        assert!(BlockEnvelope::zeroed().is_zero());
    }

    #[test]
    fn test_nonzero_nonce_is_not_zero() {
        let mut env = BlockEnvelope::zeroed();
        env.nonce[0] = 1;
        assert!(!env.is_zero());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut env = BlockEnvelope::zeroed();
        env.data[0] = 0xAA;
        env.data[BLOCK_SIZE - 1] = 0xBB;
        env.tag = [0x11; TAG_LEN];
        env.nonce = [0x22; NONCE_LEN];

        let bytes = env.to_bytes();
        assert_eq!(BlockEnvelope::from_bytes(&bytes), env);
    }

    #[test]
    fn test_parts_roundtrip() {
        let mut env = BlockEnvelope::zeroed();
        env.data[17] = 0x55;
        env.tag[3] = 0x66;
        env.nonce[11] = 0x77;

        let rebuilt = BlockEnvelope::from_parts(&env.data, &env.extras());
        assert_eq!(rebuilt, env);
    }
}
