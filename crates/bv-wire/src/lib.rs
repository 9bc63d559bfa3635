//! # Wire Protocol (bv-wire)
//!
//! Framed request/response between client and server over a reliable
//! ordered byte stream (TCP, default port 1311). Framing is strict
//! length-delimited by opcode; all integers are little-endian.
//!
//! # Wire Protocol
//!
//! Requests (client → server):
//! - Byte 0: opcode
//! - For READ:  bytes 1..9 block id (u64 LE)
//! - For WRITE: bytes 1..9 block id, bytes 9..4133 envelope
//!   (ciphertext ‖ tag ‖ nonce)
//! - SYNC carries no body
//!
//! Replies (server → client):
//! - SYNC:  32-byte current root
//! - READ:  1 opcode byte — READ followed by the envelope, or NDAT with
//!   no payload — then `depth` × 32-byte authentication path
//! - WRITE: `depth` × 32-byte authentication path
//!
//! The authentication path is transmitted leaf-sibling first, up to but
//! not including the root. Each request's reply precedes the next
//! request; there is no resynchronization marker, so any framing error is
//! fatal to the session.

pub mod errors;

pub use errors::WireError;

use shared_types::BlockId;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 1311;

/// Length of the block id field.
pub const ID_LEN: usize = 8;

/// Protocol opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Request the current root hash.
    Sync = 0x00,
    /// Read one block; also prefixes a reply that carries an envelope.
    Read = 0x01,
    /// Write one block.
    Write = 0x02,
    /// Reply prefix: the requested slot is all zero, no envelope follows.
    NoData = 0x03,
}

impl Opcode {
    /// Parse an opcode byte.
    ///
    /// # Errors
    ///
    /// Returns `WireError::UnknownOpcode` for any unassigned byte.
    pub fn from_u8(byte: u8) -> Result<Self, WireError> {
        match byte {
            0x00 => Ok(Opcode::Sync),
            0x01 => Ok(Opcode::Read),
            0x02 => Ok(Opcode::Write),
            0x03 => Ok(Opcode::NoData),
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

/// Encode a block id for the wire.
pub fn encode_id(id: BlockId) -> [u8; ID_LEN] {
    id.to_le_bytes()
}

/// Decode a block id from the wire.
pub fn decode_id(bytes: [u8; ID_LEN]) -> BlockId {
    BlockId::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for op in [Opcode::Sync, Opcode::Read, Opcode::Write, Opcode::NoData] {
            assert_eq!(Opcode::from_u8(op as u8).unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        assert!(matches!(
            Opcode::from_u8(0x7F),
            Err(WireError::UnknownOpcode(0x7F))
        ));
    }

    #[test]
    fn test_id_is_little_endian() {
        assert_eq!(encode_id(0x0102_0304), [0x04, 0x03, 0x02, 0x01, 0, 0, 0, 0]);
        assert_eq!(decode_id(encode_id(u64::MAX)), u64::MAX);
    }
}
