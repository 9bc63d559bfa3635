//! # Client Error Types
//!
//! Two layers: [`TransportError`] for anything fatal to the session
//! (socket, protocol, integrity, crypto), and [`FsError`] for the
//! filesystem's resource errors plus a transport passthrough. The facade
//! maps `FsError` onto kernel error codes via [`FsError::errno`].

use shared_types::BlockId;
use thiserror::Error;

/// Session-fatal errors from the block transport.
///
/// There is no resynchronization marker in the protocol, so the client
/// must abort rather than retry after any of these.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket or local file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation by the server
    #[error("Protocol error: {0}")]
    Wire(#[from] bv_wire::WireError),

    /// AEAD seal/open failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] shared_crypto::CryptoError),

    /// Authentication path did not fold to the persisted top hash
    #[error("Integrity violation reading block {id}: auth path does not match trusted root")]
    IntegrityViolation { id: BlockId },

    /// Top-hash file does not hold exactly one hash
    #[error("Top-hash file corrupt: expected 32 bytes, got {0}")]
    TopHashCorrupt(usize),
}

/// Filesystem-level errors surfaced to the facade.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path component does not exist
    #[error("Not found")]
    NotFound,

    /// Path descends through a non-directory
    #[error("Not a directory")]
    NotADirectory,

    /// Operation requires a file but found a directory
    #[error("Is a directory")]
    IsADirectory,

    /// Directory entry table is full
    #[error("Directory full")]
    DirectoryFull,

    /// Bitmap exhausted or file table capacity exceeded
    #[error("Out of blocks")]
    NoSpace,

    /// Name exceeds the fixed-width name field
    #[error("Name too long")]
    NameTooLong,

    /// The operation target is busy (e.g. removing the root directory)
    #[error("Busy")]
    Busy,

    /// Session-fatal transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

// Kernel error codes the binding understands (Linux values).
const ENOENT: i32 = 2;
const EIO: i32 = 5;
const ENOMEM: i32 = 12;
const EBUSY: i32 = 16;
const ENOTDIR: i32 = 20;
const EISDIR: i32 = 21;
const ENAMETOOLONG: i32 = 36;

impl FsError {
    /// The kernel error code for this error, as a positive number.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => ENOENT,
            FsError::NotADirectory => ENOTDIR,
            FsError::IsADirectory => EISDIR,
            FsError::DirectoryFull | FsError::NoSpace => ENOMEM,
            FsError::NameTooLong => ENAMETOOLONG,
            FsError::Busy => EBUSY,
            FsError::Transport(_) => EIO,
        }
    }
}
