//! # Filesystem Facade
//!
//! The path-level surface the kernel binding calls: resolve, validate the
//! kind against the operation, delegate to the volume, map errors to
//! kernel codes via [`FsError::errno`]. Directory attributes are mode
//! 0755 with link count 2; files are mode 0777 with link count 1.

use shared_types::{BlockId, Timestamp};

use crate::fs::layout::EntryKind;
use crate::fs::{path, Volume};
use crate::ports::BlockTransport;
use crate::FsError;

/// Attributes reported by `getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub nlink: u32,
    pub atime: Timestamp,
    pub mtime: Timestamp,
}

/// One `readdir` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Path-level filesystem operations over a [`Volume`].
pub struct FsFacade<T: BlockTransport> {
    vol: Volume<T>,
}

impl<T: BlockTransport> FsFacade<T> {
    pub fn new(vol: Volume<T>) -> Self {
        Self { vol }
    }

    /// Direct volume access (tests and the binding's bring-up).
    pub fn volume_mut(&mut self) -> &mut Volume<T> {
        &mut self.vol
    }

    pub fn getattr(&mut self, path: &str) -> Result<FileAttr, FsError> {
        let (id, kind) = self.vol.resolve(path)?;
        match kind {
            EntryKind::Directory => {
                let dir = self.vol.load_dir(id)?;
                Ok(FileAttr {
                    kind,
                    size: 0,
                    mode: 0o755,
                    nlink: 2,
                    atime: dir.atime,
                    mtime: dir.mtime,
                })
            }
            EntryKind::File => {
                let file = self.vol.load_file(id)?;
                Ok(FileAttr {
                    kind,
                    size: file.size,
                    mode: 0o777,
                    nlink: 1,
                    atime: file.atime,
                    mtime: file.mtime,
                })
            }
        }
    }

    pub fn readdir(&mut self, path: &str) -> Result<Vec<DirListEntry>, FsError> {
        let id = self.resolve_dir(path)?;
        let dir = self.vol.load_dir(id)?;

        Ok(dir
            .entries
            .iter()
            .flatten()
            .map(|entry| DirListEntry {
                name: entry.name.display(),
                kind: entry.kind,
            })
            .collect())
    }

    /// Open validates existence and kind; there is no per-open state.
    pub fn open(&mut self, path: &str) -> Result<(), FsError> {
        self.resolve_file(path).map(|_| ())
    }

    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        let id = self.resolve_file(path)?;
        self.vol.read_file(id, buf, offset)
    }

    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize, FsError> {
        let id = self.resolve_file(path)?;
        self.vol.write_file(id, buf, offset)
    }

    pub fn truncate(&mut self, path: &str, size: u64) -> Result<(), FsError> {
        let id = self.resolve_file(path)?;
        self.vol.truncate_file(id, size)
    }

    pub fn mkdir(&mut self, path: &str) -> Result<(), FsError> {
        let (parent, name) = self.resolve_parent(path)?;
        self.vol.create_dir(parent, name).map(|_| ())
    }

    pub fn create(&mut self, path: &str) -> Result<(), FsError> {
        let (parent, name) = self.resolve_parent(path)?;
        self.vol.create_file(parent, name).map(|_| ())
    }

    pub fn unlink(&mut self, path: &str) -> Result<(), FsError> {
        let id = self.resolve_file(path)?;
        self.vol.remove_file(id)
    }

    /// Remove a directory and everything under it (no ENOTEMPTY; removal
    /// recurses). The root directory itself cannot be removed.
    pub fn rmdir(&mut self, path: &str) -> Result<(), FsError> {
        let (id, kind) = self.vol.resolve(path)?;
        if kind != EntryKind::Directory {
            return Err(FsError::NotADirectory);
        }
        if id == self.vol.root_dir()? {
            return Err(FsError::Busy);
        }
        self.vol.remove_dir(id)
    }

    pub fn utimens(
        &mut self,
        path: &str,
        atime: Timestamp,
        mtime: Timestamp,
    ) -> Result<(), FsError> {
        let (id, kind) = self.vol.resolve(path)?;
        self.vol.set_times(id, kind, atime, mtime)
    }

    /// Flush all three caches to the server.
    pub fn flush(&mut self) -> Result<(), FsError> {
        self.vol.flush_all()
    }

    /// Flush and tear down the session.
    pub fn stop(mut self) -> Result<(), FsError> {
        self.flush()
    }

    fn resolve_dir(&mut self, path: &str) -> Result<BlockId, FsError> {
        match self.vol.resolve(path)? {
            (id, EntryKind::Directory) => Ok(id),
            _ => Err(FsError::NotADirectory),
        }
    }

    fn resolve_file(&mut self, path: &str) -> Result<BlockId, FsError> {
        match self.vol.resolve(path)? {
            (id, EntryKind::File) => Ok(id),
            _ => Err(FsError::IsADirectory),
        }
    }

    fn resolve_parent<'p>(&mut self, path: &'p str) -> Result<(BlockId, &'p str), FsError> {
        let (parent_path, name) = path::split_parent(path);
        let parent = self.resolve_dir(parent_path)?;
        Ok((parent, name))
    }
}
