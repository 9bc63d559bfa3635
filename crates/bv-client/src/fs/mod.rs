//! # Filesystem on Blocks
//!
//! All metadata and data live inside fixed-size blocks reached through the
//! caches: the superblock at block 0, the allocation bitmap right after
//! it, and directory/file blocks allocated on demand.
//!
//! Structured blocks are decoded into owned values, mutated, and encoded
//! back through the cache. A decoded value is a snapshot: any cache call
//! in between may evict the backing line, so nothing here holds a buffer
//! across another block access, and every mutation re-encodes the whole
//! block and marks it dirty.

pub mod layout;
pub mod path;

use shared_types::{BlockBuf, BlockId, Timestamp, BLOCK_COUNT, BLOCK_SIZE};
use tracing::info;

use crate::cache::{BlockCache, CACHE_LINES};
use crate::ports::BlockTransport;
use crate::FsError;

use layout::{
    bitmap_position, DirBlock, DirEntry, DirName, EntryKind, FileBlock, Superblock,
    BITS_PER_BITMAP_BLOCK, DIR_MAX_ENTRIES, FILE_MAX_SIZE, SUPERBLOCK_ID,
};

/// The mounted store: transport plus the three caches.
///
/// `meta` holds the superblock and bitmap, `nodes` holds directory and
/// file blocks, `data` holds file contents. The split is advisory (it
/// reduces cross-kind conflict misses); the policy is identical.
pub struct Volume<T: BlockTransport> {
    tx: T,
    meta: BlockCache,
    nodes: BlockCache,
    data: BlockCache,
}

impl<T: BlockTransport> Volume<T> {
    pub fn new(tx: T) -> Self {
        Self {
            tx,
            meta: BlockCache::new(CACHE_LINES),
            nodes: BlockCache::new(CACHE_LINES),
            data: BlockCache::new(CACHE_LINES),
        }
    }

    /// Direct access to the transport (integration tests).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.tx
    }

    /// Write every dirty cache line back to the server.
    pub fn flush_all(&mut self) -> Result<(), FsError> {
        self.meta.flush_all(&mut self.tx)?;
        self.nodes.flush_all(&mut self.tx)?;
        self.data.flush_all(&mut self.tx)?;
        Ok(())
    }

    // =========================================================================
    // Superblock and allocation bitmap
    // =========================================================================

    pub fn load_super(&mut self) -> Result<Superblock, FsError> {
        Ok(Superblock::decode(self.meta.get(&mut self.tx, SUPERBLOCK_ID)?))
    }

    fn store_super(&mut self, sb: &Superblock) -> Result<(), FsError> {
        sb.encode(self.meta.get(&mut self.tx, SUPERBLOCK_ID)?);
        self.meta.mark_dirty(SUPERBLOCK_ID);
        Ok(())
    }

    /// Root directory block id.
    pub fn root_dir(&mut self) -> Result<BlockId, FsError> {
        Ok(self.load_super()?.root_dir)
    }

    /// Lay down a fresh filesystem: superblock, zeroed bitmap with the
    /// reserved region marked, and an empty root directory.
    pub fn format(&mut self) -> Result<(), FsError> {
        let bitmap_blocks = BLOCK_COUNT.div_ceil(BITS_PER_BITMAP_BLOCK);
        let reserved = 1 + bitmap_blocks;
        let sb = Superblock {
            total_blocks: BLOCK_COUNT,
            free_blocks: BLOCK_COUNT - reserved,
            bitmap_blocks,
            root_dir: 0,
        };
        sb.encode(self.meta.claim(&mut self.tx, SUPERBLOCK_ID)?);

        for map_id in 1..=bitmap_blocks {
            self.meta.claim(&mut self.tx, map_id)?.fill(0);
        }
        for id in 0..reserved {
            let (map_id, byte, bit) = bitmap_position(id);
            self.meta.get(&mut self.tx, map_id)?[byte] |= 1 << bit;
            self.meta.mark_dirty(map_id);
        }

        let root = self.alloc()?;
        let now = Timestamp::now();
        DirBlock::new(root, root, 0, now).encode(self.nodes.claim(&mut self.tx, root)?);

        let mut sb = self.load_super()?;
        sb.root_dir = root;
        self.store_super(&sb)?;

        self.flush_all()?;
        info!(
            "[client] formatted volume: {} blocks, root dir at block {}",
            BLOCK_COUNT, root
        );
        Ok(())
    }

    /// Allocate the lowest free block. Never returns a reserved id or 0.
    pub fn alloc(&mut self) -> Result<BlockId, FsError> {
        let mut sb = self.load_super()?;
        if sb.free_blocks == 0 {
            return Err(FsError::NoSpace);
        }
        let reserved = sb.reserved_blocks();

        for map_index in 0..sb.bitmap_blocks {
            let map_id = 1 + map_index;
            let first_id = map_index * BITS_PER_BITMAP_BLOCK;

            let found = scan_for_clear_bit(
                self.meta.get(&mut self.tx, map_id)?,
                first_id,
                reserved,
                sb.total_blocks,
            );

            if let Some((byte, bit)) = found {
                self.meta.get(&mut self.tx, map_id)?[byte] |= 1 << bit;
                self.meta.mark_dirty(map_id);

                sb.free_blocks -= 1;
                self.store_super(&sb)?;

                return Ok(first_id + byte as u64 * 8 + bit as u64);
            }
        }

        Err(FsError::NoSpace)
    }

    /// Return a block to the bitmap.
    pub fn free(&mut self, id: BlockId) -> Result<(), FsError> {
        let mut sb = self.load_super()?;
        let (map_id, byte, bit) = bitmap_position(id);

        self.meta.get(&mut self.tx, map_id)?[byte] &= !(1 << bit);
        self.meta.mark_dirty(map_id);

        sb.free_blocks += 1;
        self.store_super(&sb)
    }

    // =========================================================================
    // Directories and files
    // =========================================================================

    pub fn load_dir(&mut self, id: BlockId) -> Result<DirBlock, FsError> {
        Ok(DirBlock::decode(self.nodes.get(&mut self.tx, id)?))
    }

    fn store_dir(&mut self, id: BlockId, dir: &DirBlock) -> Result<(), FsError> {
        dir.encode(self.nodes.get(&mut self.tx, id)?);
        self.nodes.mark_dirty(id);
        Ok(())
    }

    pub fn load_file(&mut self, id: BlockId) -> Result<FileBlock, FsError> {
        Ok(FileBlock::decode(self.nodes.get(&mut self.tx, id)?))
    }

    fn store_file(&mut self, id: BlockId, file: &FileBlock) -> Result<(), FsError> {
        file.encode(self.nodes.get(&mut self.tx, id)?);
        self.nodes.mark_dirty(id);
        Ok(())
    }

    /// Resolve a path to its block and kind. The empty path is the root
    /// directory; descending through a file fails with `NotADirectory`.
    pub fn resolve(&mut self, path: &str) -> Result<(BlockId, EntryKind), FsError> {
        let mut id = self.root_dir()?;
        let mut kind = EntryKind::Directory;

        for name in path::components(path) {
            if kind != EntryKind::Directory {
                return Err(FsError::NotADirectory);
            }
            let dir = self.load_dir(id)?;
            let entry = dir.lookup(name).ok_or(FsError::NotFound)?;
            id = entry.id;
            kind = entry.kind;
        }

        Ok((id, kind))
    }

    /// Create a subdirectory of `parent_id` and return its block id.
    pub fn create_dir(&mut self, parent_id: BlockId, name: &str) -> Result<BlockId, FsError> {
        let (slot, name, child, now) = self.prepare_entry(parent_id, name)?;

        DirBlock::new(child, parent_id, slot, now).encode(self.nodes.claim(&mut self.tx, child)?);

        self.insert_entry(
            parent_id,
            slot,
            DirEntry {
                kind: EntryKind::Directory,
                name,
                id: child,
            },
            now,
        )?;
        Ok(child)
    }

    /// Create an empty file in `parent_id` and return its block id.
    pub fn create_file(&mut self, parent_id: BlockId, name: &str) -> Result<BlockId, FsError> {
        let (slot, name, child, now) = self.prepare_entry(parent_id, name)?;

        FileBlock::new(parent_id, slot, now).encode(self.nodes.claim(&mut self.tx, child)?);

        self.insert_entry(
            parent_id,
            slot,
            DirEntry {
                kind: EntryKind::File,
                name,
                id: child,
            },
            now,
        )?;
        Ok(child)
    }

    /// Shared create path: validate the name and capacity, allocate the
    /// child block, pick the parent slot.
    fn prepare_entry(
        &mut self,
        parent_id: BlockId,
        name: &str,
    ) -> Result<(u32, DirName, BlockId, Timestamp), FsError> {
        let name = DirName::new(name)?;

        let sb = self.load_super()?;
        if sb.free_blocks == 0 {
            return Err(FsError::NoSpace);
        }

        let parent = self.load_dir(parent_id)?;
        if parent.entry_count as usize >= DIR_MAX_ENTRIES {
            return Err(FsError::DirectoryFull);
        }
        let slot = parent.free_slot().ok_or(FsError::DirectoryFull)?;

        let child = self.alloc()?;
        Ok((slot as u32, name, child, Timestamp::now()))
    }

    fn insert_entry(
        &mut self,
        parent_id: BlockId,
        slot: u32,
        entry: DirEntry,
        now: Timestamp,
    ) -> Result<(), FsError> {
        let mut parent = self.load_dir(parent_id)?;
        parent.entries[slot as usize] = Some(entry);
        parent.entry_count += 1;
        parent.mtime = now;
        self.store_dir(parent_id, &parent)
    }

    /// Delete a file: data blocks first, then the parent entry, then the
    /// file block itself, so a crash mid-delete leaks at most the file
    /// block.
    pub fn remove_file(&mut self, id: BlockId) -> Result<(), FsError> {
        let file = self.load_file(id)?;

        for &data_id in &file.blocks {
            self.free(data_id)?;
        }

        self.clear_parent_entry(file.parent, file.entry_index)?;
        self.free(id)
    }

    /// Delete a directory and everything under it; a non-empty directory
    /// is removed recursively rather than rejected.
    pub fn remove_dir(&mut self, id: BlockId) -> Result<(), FsError> {
        let dir = self.load_dir(id)?;

        for entry in dir.entries.iter().flatten() {
            if entry.name.matches(".") || entry.name.matches("..") {
                continue;
            }
            match entry.kind {
                EntryKind::File => self.remove_file(entry.id)?,
                EntryKind::Directory => self.remove_dir(entry.id)?,
            }
        }

        self.clear_parent_entry(dir.parent, dir.entry_index)?;
        self.free(id)
    }

    fn clear_parent_entry(&mut self, parent_id: BlockId, entry_index: u32) -> Result<(), FsError> {
        let mut parent = self.load_dir(parent_id)?;
        parent.entries[entry_index as usize] = None;
        parent.entry_count = parent.entry_count.saturating_sub(1);
        parent.mtime = Timestamp::now();
        self.store_dir(parent_id, &parent)
    }

    // =========================================================================
    // File contents
    // =========================================================================

    /// Read from a file at `offset`, clamped to its size. Returns the
    /// number of bytes copied; reads past EOF return 0.
    pub fn read_file(&mut self, id: BlockId, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        let file = self.load_file(id)?;

        if buf.is_empty() || offset >= file.size {
            return Ok(0);
        }
        let end = file.size.min(offset + buf.len() as u64);

        let mut pos = offset;
        let mut copied = 0usize;
        while pos < end {
            let index = (pos / BLOCK_SIZE as u64) as usize;
            let off = (pos % BLOCK_SIZE as u64) as usize;
            let n = (BLOCK_SIZE - off).min((end - pos) as usize);

            let Some(&data_id) = file.blocks.get(index) else {
                break;
            };
            let data = self.data.get(&mut self.tx, data_id)?;
            buf[copied..copied + n].copy_from_slice(&data[off..off + n]);

            copied += n;
            pos += n as u64;
        }

        Ok(copied)
    }

    /// Write to a file at `offset`, allocating data blocks past EOF.
    /// Whole-block stores go through `claim` and skip the fetch.
    pub fn write_file(&mut self, id: BlockId, buf: &[u8], offset: u64) -> Result<usize, FsError> {
        let mut file = self.load_file(id)?;

        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset + buf.len() as u64;
        if end > FILE_MAX_SIZE {
            return Err(FsError::NoSpace);
        }

        let needed = end.div_ceil(BLOCK_SIZE as u64) as usize;
        while file.blocks.len() < needed {
            match self.alloc() {
                Ok(data_id) => file.blocks.push(data_id),
                Err(e) => {
                    // Keep what was allocated so nothing leaks.
                    self.store_file(id, &file)?;
                    return Err(e);
                }
            }
        }

        let mut pos = offset;
        let mut copied = 0usize;
        while pos < end {
            let index = (pos / BLOCK_SIZE as u64) as usize;
            let off = (pos % BLOCK_SIZE as u64) as usize;
            let n = (BLOCK_SIZE - off).min((end - pos) as usize);

            let data_id = file.blocks[index];
            let data = if off == 0 && n == BLOCK_SIZE {
                self.data.claim(&mut self.tx, data_id)?
            } else {
                self.data.get(&mut self.tx, data_id)?
            };
            data[off..off + n].copy_from_slice(&buf[copied..copied + n]);
            self.data.mark_dirty(data_id);

            copied += n;
            pos += n as u64;
        }

        file.size = file.size.max(end);
        file.mtime = Timestamp::now();
        self.store_file(id, &file)?;

        Ok(copied)
    }

    /// Grow (allocating) or shrink (freeing) a file to `size` bytes.
    pub fn truncate_file(&mut self, id: BlockId, size: u64) -> Result<(), FsError> {
        let mut file = self.load_file(id)?;

        if size > FILE_MAX_SIZE {
            return Err(FsError::NoSpace);
        }
        let new_count = size.div_ceil(BLOCK_SIZE as u64) as usize;

        if new_count > file.blocks.len() {
            while file.blocks.len() < new_count {
                match self.alloc() {
                    Ok(data_id) => file.blocks.push(data_id),
                    Err(e) => {
                        self.store_file(id, &file)?;
                        return Err(e);
                    }
                }
            }
        } else {
            for &data_id in &file.blocks[new_count..] {
                self.free(data_id)?;
            }
            file.blocks.truncate(new_count);
        }

        file.size = size;
        file.mtime = Timestamp::now();
        self.store_file(id, &file)
    }

    /// Overwrite access/modification times.
    pub fn set_times(
        &mut self,
        id: BlockId,
        kind: EntryKind,
        atime: Timestamp,
        mtime: Timestamp,
    ) -> Result<(), FsError> {
        match kind {
            EntryKind::File => {
                let mut file = self.load_file(id)?;
                file.atime = atime;
                file.mtime = mtime;
                self.store_file(id, &file)
            }
            EntryKind::Directory => {
                let mut dir = self.load_dir(id)?;
                dir.atime = atime;
                dir.mtime = mtime;
                self.store_dir(id, &dir)
            }
        }
    }
}

fn scan_for_clear_bit(
    buf: &BlockBuf,
    first_id: u64,
    reserved: u64,
    total: u64,
) -> Option<(usize, u8)> {
    for (byte_index, &byte) in buf.iter().enumerate() {
        if byte == 0xFF {
            continue;
        }
        for bit in 0u8..8 {
            let id = first_id + byte_index as u64 * 8 + bit as u64;
            if id < reserved {
                continue;
            }
            if id >= total {
                return None;
            }
            if byte & (1 << bit) == 0 {
                return Some((byte_index, bit));
            }
        }
    }
    None
}
