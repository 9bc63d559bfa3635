//! # Server-Side Tree
//!
//! Flat level-order storage with leaf update, bulk rebuild, and
//! authentication-path extraction. Serialization is the raw node
//! concatenation persisted to the server's `tree` file.

use shared_crypto::hash_pair;
use shared_types::{BlockId, Hash, HASH_LEN};

use crate::{leaf_count, leaf_index, node_count, parent, sibling, MerkleError};

/// Complete binary Merkle tree over `2^depth` blocks.
pub struct MerkleTree {
    depth: u32,
    nodes: Vec<Hash>,
}

impl MerkleTree {
    /// Tree with every node zeroed. Callers normally want [`Self::seeded`].
    pub fn new(depth: u32) -> Self {
        Self {
            depth,
            nodes: vec![[0u8; HASH_LEN]; node_count(depth) as usize],
        }
    }

    /// Tree with every leaf set to `leaf` and all internal nodes computed.
    ///
    /// Used at store initialization with the zero-envelope digest, so an
    /// untouched store still verifies end to end.
    pub fn seeded(depth: u32, leaf: Hash) -> Self {
        let mut tree = Self::new(depth);
        let first_leaf = leaf_index(depth, 0) as usize;
        for node in &mut tree.nodes[first_leaf..] {
            *node = leaf;
        }
        tree.rebuild();
        tree
    }

    /// Tree depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of leaves.
    pub fn leaves(&self) -> u64 {
        leaf_count(self.depth)
    }

    /// The top hash.
    pub fn root(&self) -> Hash {
        self.nodes[0]
    }

    /// Current hash of the leaf for block `b`.
    pub fn leaf(&self, b: BlockId) -> Hash {
        self.nodes[leaf_index(self.depth, b) as usize]
    }

    /// Set the leaf for block `b` and recompute every ancestor up to the
    /// root.
    pub fn set_leaf(&mut self, b: BlockId, hash: Hash) {
        let mut node = leaf_index(self.depth, b);
        self.nodes[node as usize] = hash;

        while node != 0 {
            node = parent(node);
            self.update_node(node);
        }
    }

    /// Bottom-up recompute of all internal nodes from the current leaves.
    pub fn rebuild(&mut self) {
        let first_leaf = leaf_index(self.depth, 0);
        for node in (0..first_leaf).rev() {
            self.update_node(node);
        }
    }

    /// Sibling hashes on the path from block `b`'s leaf to the root,
    /// leaf-sibling first, root excluded. Always `depth` hashes.
    pub fn auth_path(&self, b: BlockId) -> Vec<Hash> {
        let mut path = Vec::with_capacity(self.depth as usize);
        let mut node = leaf_index(self.depth, b);

        while node != 0 {
            path.push(self.nodes[sibling(node) as usize]);
            node = parent(node);
        }

        path
    }

    fn update_node(&mut self, node: u64) {
        let left = self.nodes[(2 * node + 1) as usize];
        let right = self.nodes[(2 * node + 2) as usize];
        self.nodes[node as usize] = hash_pair(&left, &right);
    }

    /// Serialize as the level-order node concatenation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.nodes.len() * HASH_LEN);
        for node in &self.nodes {
            out.extend_from_slice(node);
        }
        out
    }

    /// Parse a tree of the given depth from its serialized form.
    pub fn from_bytes(depth: u32, bytes: &[u8]) -> Result<Self, MerkleError> {
        let expected = node_count(depth) as usize * HASH_LEN;
        if bytes.len() != expected {
            return Err(MerkleError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let mut tree = Self::new(depth);
        for (i, chunk) in bytes.chunks_exact(HASH_LEN).enumerate() {
            tree.nodes[i].copy_from_slice(chunk);
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathFolder;
    use shared_crypto::sha256;

    fn make_hash(n: u8) -> Hash {
        let mut h = [0u8; HASH_LEN];
        h[0] = n;
        h
    }

    #[test]
    fn test_seeded_tree_root() {
        // Depth 1: root = H(leaf || leaf).
        let leaf = sha256(b"zero");
        let tree = MerkleTree::seeded(1, leaf);
        assert_eq!(tree.root(), hash_pair(&leaf, &leaf));
    }

    #[test]
    fn test_set_leaf_changes_root() {
        let mut tree = MerkleTree::seeded(3, make_hash(0));
        let before = tree.root();

        tree.set_leaf(5, make_hash(0xFF));
        assert_ne!(tree.root(), before);

        tree.set_leaf(5, make_hash(0));
        assert_eq!(tree.root(), before);
    }

    #[test]
    fn test_set_leaf_matches_rebuild() {
        let mut incremental = MerkleTree::seeded(4, make_hash(0));
        let mut bulk = MerkleTree::seeded(4, make_hash(0));

        for b in [0u64, 3, 7, 15, 8] {
            incremental.set_leaf(b, make_hash(b as u8 + 1));
            bulk.nodes[leaf_index(4, b) as usize] = make_hash(b as u8 + 1);
        }
        bulk.rebuild();

        assert_eq!(incremental.root(), bulk.root());
    }

    #[test]
    fn test_auth_path_length() {
        let tree = MerkleTree::seeded(4, make_hash(0));
        assert_eq!(tree.auth_path(0).len(), 4);
        assert_eq!(tree.auth_path(15).len(), 4);
    }

    #[test]
    fn test_auth_path_folds_to_root_for_every_leaf() {
        let mut tree = MerkleTree::seeded(3, make_hash(0));
        for b in 0..tree.leaves() {
            tree.set_leaf(b, make_hash(b as u8 + 10));
        }

        // Exercises both parity cases: even and odd leaves place the
        // running hash on opposite sides.
        for b in 0..tree.leaves() {
            let mut folder = PathFolder::new(tree.depth(), b, tree.leaf(b));
            for sib in tree.auth_path(b) {
                folder.absorb(&sib);
            }
            assert_eq!(folder.finish(), tree.root(), "leaf {}", b);
        }
    }

    #[test]
    fn test_tampered_sibling_breaks_fold() {
        let tree = MerkleTree::seeded(3, make_hash(1));
        let mut path = tree.auth_path(2);
        path[1][0] ^= 0xFF;

        let mut folder = PathFolder::new(3, 2, tree.leaf(2));
        for sib in path {
            folder.absorb(&sib);
        }
        assert_ne!(folder.finish(), tree.root());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut tree = MerkleTree::seeded(3, make_hash(9));
        tree.set_leaf(1, make_hash(42));

        let restored = MerkleTree::from_bytes(3, &tree.to_bytes()).unwrap();
        assert_eq!(restored.root(), tree.root());
        assert_eq!(restored.leaf(1), tree.leaf(1));
    }

    #[test]
    fn test_from_bytes_rejects_bad_length() {
        let tree = MerkleTree::seeded(3, make_hash(0));
        let mut bytes = tree.to_bytes();
        bytes.pop();

        assert!(matches!(
            MerkleTree::from_bytes(3, &bytes),
            Err(MerkleError::LengthMismatch { .. })
        ));
    }
}
