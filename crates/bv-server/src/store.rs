//! # Persistent Block Store
//!
//! Three files in the server root, all slot-addressed by block id:
//!
//! ```text
//! data   BLOCK_COUNT × 4096   ciphertext
//! aead   BLOCK_COUNT × 28     tag ‖ nonce
//! tree   (2^(D+1)−1) × 32     Merkle nodes, level order
//! ```
//!
//! The directory is created 0700 and the files 0600. On first run every
//! leaf is seeded with the digest of the zero envelope so an untouched
//! store verifies end to end. The tree file is only rewritten at session
//! end; if the process died between an envelope write and that point, the
//! file's mtime lags `data`/`aead` and the tree is rebuilt from the
//! on-disk envelopes at next startup instead of being trusted.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::{DirBuilderExt, FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use bv_merkle::MerkleTree;
use shared_crypto::envelope_digest;
use shared_types::envelope::EXTRAS_LEN;
use shared_types::{BlockEnvelope, BlockId, Hash, BLOCK_COUNT, BLOCK_SIZE, MERKLE_DEPTH};
use tracing::{info, warn};

use crate::ServerError;

/// The server's persistent state: the three files plus the in-memory tree.
pub struct BlockStore {
    data: File,
    aead: File,
    tree_path: PathBuf,
    tree: MerkleTree,
}

impl BlockStore {
    /// Open the store under `root`, formatting it on first run.
    pub fn open_or_format(root: &Path) -> Result<Self, ServerError> {
        if !root.exists() {
            std::fs::DirBuilder::new().mode(0o700).create(root)?;
        }

        let data_path = root.join("data");
        let aead_path = root.join("aead");
        let tree_path = root.join("tree");

        if !data_path.exists() {
            return Self::format(&data_path, &aead_path, tree_path);
        }

        let data = open_rw(&data_path)?;
        let aead = open_rw(&aead_path)?;

        let tree = match load_tree(&tree_path, &data_path, &aead_path) {
            Some(tree) => tree,
            None => {
                warn!("[server] tree file missing or stale, rebuilding from envelopes");
                let tree = rebuild_tree(&data, &aead)?;
                persist_tree_file(&tree_path, &tree)?;
                tree
            }
        };

        info!(
            "[server] store opened: {} blocks, root {}",
            tree.leaves(),
            hex::encode(&tree.root()[..8])
        );

        Ok(Self {
            data,
            aead,
            tree_path,
            tree,
        })
    }

    fn format(data_path: &Path, aead_path: &Path, tree_path: PathBuf) -> Result<Self, ServerError> {
        let data = open_rw(data_path)?;
        data.set_len(BLOCK_COUNT * BLOCK_SIZE as u64)?;

        let aead = open_rw(aead_path)?;
        aead.set_len(BLOCK_COUNT * EXTRAS_LEN as u64)?;

        let tree = MerkleTree::seeded(MERKLE_DEPTH, envelope_digest(&BlockEnvelope::zeroed()));
        persist_tree_file(&tree_path, &tree)?;

        info!(
            "[server] 💾 formatted store: {} blocks of {} bytes, root {}",
            BLOCK_COUNT,
            BLOCK_SIZE,
            hex::encode(&tree.root()[..8])
        );

        Ok(Self {
            data,
            aead,
            tree_path,
            tree,
        })
    }

    /// Current top hash.
    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    /// Authentication path for block `id`, leaf-sibling first.
    pub fn auth_path(&self, id: BlockId) -> Vec<Hash> {
        self.tree.auth_path(id)
    }

    /// Load the envelope stored at `id`.
    pub fn read_envelope(&self, id: BlockId) -> Result<BlockEnvelope, ServerError> {
        let mut data = [0u8; BLOCK_SIZE];
        self.data.read_exact_at(&mut data, id * BLOCK_SIZE as u64)?;

        let mut extras = [0u8; EXTRAS_LEN];
        self.aead.read_exact_at(&mut extras, id * EXTRAS_LEN as u64)?;

        Ok(BlockEnvelope::from_parts(&data, &extras))
    }

    /// Store the envelope at `id` and fold it into the tree.
    ///
    /// The ciphertext lands before the extras; the tree update is
    /// in-memory only until [`Self::persist_tree`].
    pub fn write_envelope(&mut self, id: BlockId, env: &BlockEnvelope) -> Result<(), ServerError> {
        self.data.write_all_at(&env.data, id * BLOCK_SIZE as u64)?;
        self.aead
            .write_all_at(&env.extras(), id * EXTRAS_LEN as u64)?;

        self.tree.set_leaf(id, envelope_digest(env));
        Ok(())
    }

    /// Rewrite the tree file from the in-memory tree (temp file + rename).
    pub fn persist_tree(&self) -> Result<(), ServerError> {
        persist_tree_file(&self.tree_path, &self.tree)
    }
}

fn open_rw(path: &Path) -> Result<File, ServerError> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(0o600)
        .open(path)?)
}

/// Load the persisted tree, or `None` when it must be rebuilt: file
/// missing, unparsable, or older than either envelope file (crash between
/// envelope writes and tree persistence).
fn load_tree(tree_path: &Path, data_path: &Path, aead_path: &Path) -> Option<MerkleTree> {
    let tree_mtime = std::fs::metadata(tree_path).ok()?.modified().ok()?;
    for envelope_file in [data_path, aead_path] {
        let mtime = std::fs::metadata(envelope_file).ok()?.modified().ok()?;
        if tree_mtime < mtime {
            return None;
        }
    }

    let bytes = std::fs::read(tree_path).ok()?;
    MerkleTree::from_bytes(MERKLE_DEPTH, &bytes).ok()
}

fn rebuild_tree(data: &File, aead: &File) -> Result<MerkleTree, ServerError> {
    let mut tree = MerkleTree::new(MERKLE_DEPTH);

    for id in 0..BLOCK_COUNT {
        let mut slot = [0u8; BLOCK_SIZE];
        data.read_exact_at(&mut slot, id * BLOCK_SIZE as u64)?;

        let mut extras = [0u8; EXTRAS_LEN];
        aead.read_exact_at(&mut extras, id * EXTRAS_LEN as u64)?;

        tree.set_leaf(id, envelope_digest(&BlockEnvelope::from_parts(&slot, &extras)));
    }

    Ok(tree)
}

fn persist_tree_file(path: &Path, tree: &MerkleTree) -> Result<(), ServerError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, tree.to_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
