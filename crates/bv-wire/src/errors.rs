//! Wire protocol error types.

use thiserror::Error;

/// Protocol-level errors. All of them are fatal to the session.
#[derive(Debug, Error)]
pub enum WireError {
    /// Peer sent a byte that is not an assigned opcode
    #[error("Unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// Peer sent an opcode that is not valid in this position
    #[error("Unexpected opcode: {0:#04x}")]
    UnexpectedOpcode(u8),

    /// Block id outside the fixed store geometry
    #[error("Block id {id} out of range (store holds {count} blocks)")]
    IdOutOfRange { id: u64, count: u64 },
}
