use serde::{Deserialize, Serialize};
use weft_types::ChannelsHash;

/// Side of a sibling in a Merkle proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Binary Merkle tree for efficient proof of inclusion.
///
/// Constructed from a set of leaf hashes. Supports generating inclusion
/// proofs and verifying them.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// The root hash of the tree.
    root: ChannelsHash,
    /// Original leaf hashes.
    leaves: Vec<ChannelsHash>,
    /// All tree nodes (leaves + internal), stored level by level.
    /// Level 0 = leaves, last element = root.
    levels: Vec<Vec<ChannelsHash>>,
}

impl MerkleTree {
    /// Build a Merkle tree over branch entries.
    ///
    /// Each `(key, canonical)` pair becomes one leaf. Callers must pass
    /// entries in a canonical order (sorted by key) so that equal branch
    /// contents always produce the same root, regardless of the order in
    /// which the entries were written.
    pub fn from_entries(entries: &[(ChannelsHash, &[u8])]) -> Self {
        let leaves = entries
            .iter()
            .map(|(key, canonical)| leaf_hash(key, canonical))
            .collect();
        Self::from_leaves(leaves)
    }

    /// Build a Merkle tree from leaf hashes.
    ///
    /// An empty list produces a null root. A single leaf is its own root.
    pub fn from_leaves(leaves: Vec<ChannelsHash>) -> Self {
        if leaves.is_empty() {
            return Self {
                root: ChannelsHash::null(),
                leaves: vec![],
                levels: vec![],
            };
        }

        let mut levels: Vec<Vec<ChannelsHash>> = vec![leaves.clone()];
        let mut current = leaves.clone();

        while current.len() > 1 {
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                let hash = if pair.len() == 2 {
                    hash_pair(&pair[0], &pair[1])
                } else {
                    // Odd node: hash with itself
                    hash_pair(&pair[0], &pair[0])
                };
                next.push(hash);
            }
            levels.push(next.clone());
            current = next;
        }

        let root = current[0];
        Self {
            root,
            leaves,
            levels,
        }
    }

    /// The root hash of the tree.
    pub fn root(&self) -> ChannelsHash {
        self.root
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Generate an inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaves.len() || self.levels.is_empty() {
            return None;
        }

        let mut path = Vec::new();
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            let sibling = if sibling_idx < level.len() {
                level[sibling_idx]
            } else {
                // Odd level: duplicate the last element
                level[idx]
            };
            let side = if idx % 2 == 0 {
                Side::Right
            } else {
                Side::Left
            };
            path.push((sibling, side));
            idx /= 2;
        }

        Some(MerkleProof {
            leaf: self.leaves[index],
            path,
            root: self.root,
        })
    }
}

/// Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: ChannelsHash,
    /// Path of (sibling_hash, sibling_side) pairs from leaf to root.
    pub path: Vec<(ChannelsHash, Side)>,
    /// Expected root hash.
    pub root: ChannelsHash,
}

impl MerkleProof {
    /// Verify the proof: recompute the root from the leaf and path.
    pub fn verify(&self) -> bool {
        let mut current = self.leaf;
        for (sibling, side) in &self.path {
            current = match side {
                Side::Left => hash_pair(sibling, &current),
                Side::Right => hash_pair(&current, sibling),
            };
        }
        current == self.root
    }
}

/// Hash one branch entry into its leaf.
///
/// The key and the canonical record bytes are both bound into the leaf, so
/// replacing a record under the same key moves the root.
pub fn leaf_hash(key: &ChannelsHash, canonical: &[u8]) -> ChannelsHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"weft-merkle-leaf-v1:");
    hasher.update(key.as_bytes());
    hasher.update(&(canonical.len() as u64).to_le_bytes());
    hasher.update(canonical);
    ChannelsHash::from_hash(*hasher.finalize().as_bytes())
}

fn hash_pair(left: &ChannelsHash, right: &ChannelsHash) -> ChannelsHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"weft-merkle-node-v1:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    ChannelsHash::from_hash(*hasher.finalize().as_bytes())
}
