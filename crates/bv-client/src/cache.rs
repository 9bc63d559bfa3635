//! # Write-Back Block Cache
//!
//! A small direct-mapped cache of decrypted plaintext blocks. The home
//! line for block `id` is `id mod N`; a collision forces eviction, and an
//! eviction of a dirty line writes it back before the new block is
//! fetched. `get` performs at most one flush and at most one fetch, in
//! that order.
//!
//! Three independent instances sit between the filesystem and the
//! transport: superblock+bitmap, directory/file blocks, and file data.
//! The split only reduces cross-kind conflict misses; the policy is
//! identical.

use shared_types::{BlockBuf, BlockId, BLOCK_SIZE};

use crate::ports::BlockTransport;
use crate::TransportError;

/// Lines per cache instance.
pub const CACHE_LINES: usize = 4;

struct CacheLine {
    id: BlockId,
    valid: bool,
    dirty: bool,
    data: Box<BlockBuf>,
}

impl CacheLine {
    fn new() -> Self {
        Self {
            id: 0,
            valid: false,
            dirty: false,
            data: Box::new([0u8; BLOCK_SIZE]),
        }
    }

    /// Write back if dirty. A clean or invalid line is a no-op.
    fn flush<T: BlockTransport>(&mut self, tx: &mut T) -> Result<(), TransportError> {
        if self.valid && self.dirty {
            tx.write_block(self.id, &self.data)?;
            self.dirty = false;
        }
        Ok(())
    }
}

/// Direct-mapped write-back cache of plaintext blocks.
pub struct BlockCache {
    lines: Vec<CacheLine>,
}

impl BlockCache {
    /// Cache with `lines` lines (use [`CACHE_LINES`] unless testing).
    pub fn new(lines: usize) -> Self {
        Self {
            lines: (0..lines).map(|_| CacheLine::new()).collect(),
        }
    }

    fn home(&self, id: BlockId) -> usize {
        (id % self.lines.len() as u64) as usize
    }

    /// Buffer for block `id`, fetching through `tx` on a miss.
    ///
    /// On a conflict miss the occupant is flushed first; a failed fetch
    /// leaves the line invalid so a later `get` retries cleanly.
    pub fn get<T: BlockTransport>(
        &mut self,
        tx: &mut T,
        id: BlockId,
    ) -> Result<&mut BlockBuf, TransportError> {
        let home = self.home(id);
        if self.lines[home].valid && self.lines[home].id == id {
            return Ok(&mut self.lines[home].data);
        }

        let line = &mut self.lines[home];
        line.flush(tx)?;

        line.valid = false;
        tx.read_block(id, &mut line.data)?;
        line.id = id;
        line.valid = true;

        Ok(&mut line.data)
    }

    /// Buffer for block `id` without fetching its current contents.
    ///
    /// For callers about to overwrite the whole block: the line is
    /// (id, valid, dirty) on return and still holds the previous
    /// occupant's bytes, so the caller must fill all of it.
    pub fn claim<T: BlockTransport>(
        &mut self,
        tx: &mut T,
        id: BlockId,
    ) -> Result<&mut BlockBuf, TransportError> {
        let home = self.home(id);
        if self.lines[home].valid && self.lines[home].id == id {
            self.lines[home].dirty = true;
            return Ok(&mut self.lines[home].data);
        }

        let line = &mut self.lines[home];
        line.flush(tx)?;

        line.id = id;
        line.valid = true;
        line.dirty = true;

        Ok(&mut line.data)
    }

    /// Mark block `id` dirty so the next eviction or flush writes it back.
    /// Call after any mutation through a `get` buffer.
    pub fn mark_dirty(&mut self, id: BlockId) {
        let home = self.home(id);
        let line = &mut self.lines[home];
        if line.valid && line.id == id {
            line.dirty = true;
        }
    }

    /// Write back block `id` if cached and dirty.
    pub fn flush_block<T: BlockTransport>(
        &mut self,
        tx: &mut T,
        id: BlockId,
    ) -> Result<(), TransportError> {
        let home = self.home(id);
        let line = &mut self.lines[home];
        if line.valid && line.id == id {
            line.flush(tx)?;
        }
        Ok(())
    }

    /// Write back every dirty line.
    pub fn flush_all<T: BlockTransport>(&mut self, tx: &mut T) -> Result<(), TransportError> {
        for line in &mut self.lines {
            line.flush(tx)?;
        }
        Ok(())
    }
}
