//! # Transport Port
//!
//! The cache and filesystem only need two operations on the remote store.
//!
//! Production: [`crate::transport::Transport`] (wire protocol + Merkle
//! verification + AEAD).
//! Testing: [`MemoryTransport`] (below).

use shared_types::{BlockBuf, BlockId, BLOCK_SIZE};
use std::collections::HashMap;

use crate::TransportError;

/// Abstract interface for verified plaintext block I/O.
pub trait BlockTransport {
    /// Read the plaintext of block `id` into `out`.
    fn read_block(&mut self, id: BlockId, out: &mut BlockBuf) -> Result<(), TransportError>;

    /// Write the plaintext of block `id`.
    fn write_block(&mut self, id: BlockId, data: &BlockBuf) -> Result<(), TransportError>;
}

/// In-memory block store for unit tests.
///
/// Unwritten blocks read back as zeros, mirroring the server's NoData
/// answer for untouched slots. The counters let cache tests assert how
/// many round trips an operation performed.
#[derive(Default)]
pub struct MemoryTransport {
    blocks: HashMap<BlockId, Box<BlockBuf>>,
    /// Number of `read_block` calls served.
    pub reads: u64,
    /// Number of `write_block` calls served.
    pub writes: u64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct view of a stored block, bypassing the counters.
    pub fn block(&self, id: BlockId) -> Option<&BlockBuf> {
        self.blocks.get(&id).map(|b| b.as_ref())
    }
}

impl BlockTransport for MemoryTransport {
    fn read_block(&mut self, id: BlockId, out: &mut BlockBuf) -> Result<(), TransportError> {
        self.reads += 1;
        match self.blocks.get(&id) {
            Some(block) => out.copy_from_slice(block.as_ref()),
            None => out.fill(0),
        }
        Ok(())
    }

    fn write_block(&mut self, id: BlockId, data: &BlockBuf) -> Result<(), TransportError> {
        self.writes += 1;
        let slot = self
            .blocks
            .entry(id)
            .or_insert_with(|| Box::new([0u8; BLOCK_SIZE]));
        slot.copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_blocks_read_zero() {
        let mut tx = MemoryTransport::new();
        let mut buf = [0xFFu8; BLOCK_SIZE];
        tx.read_block(42, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut tx = MemoryTransport::new();
        let data = [0xABu8; BLOCK_SIZE];
        tx.write_block(7, &data).unwrap();

        let mut buf = [0u8; BLOCK_SIZE];
        tx.read_block(7, &mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!((tx.reads, tx.writes), (1, 1));
    }
}
