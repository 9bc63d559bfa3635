//! # Core Value Types
//!
//! Block geometry and the primitive aliases used across the client, the
//! server, and the Merkle layer.

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Leaf position in the Merkle tree; names one fixed-size block.
pub type BlockId = u64;

/// Plaintext payload of one block.
pub type BlockBuf = [u8; BLOCK_SIZE];

/// Fixed plaintext block size in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// Merkle tree depth. The store holds `2^MERKLE_DEPTH` blocks.
pub const MERKLE_DEPTH: u32 = 8;

/// Total number of blocks in the store.
pub const BLOCK_COUNT: u64 = 1 << MERKLE_DEPTH;

/// AES-256-GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// SHA-256 output length.
pub const HASH_LEN: usize = 32;

/// Seconds + nanoseconds since the Unix epoch.
///
/// Stored inline in file and directory blocks; 12 bytes on disk
/// (u64 seconds, u32 nanoseconds, little-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub secs: u64,
    pub nanos: u32,
}

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => Self {
                secs: d.as_secs(),
                nanos: d.subsec_nanos(),
            },
            Err(_) => Self::default(),
        }
    }
}
