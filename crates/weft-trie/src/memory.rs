use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use weft_types::ChannelsHash;

use crate::branch::BranchId;
use crate::error::TrieResult;
use crate::merkle::{MerkleProof, MerkleTree};
use crate::traits::TrieStore;

/// In-memory trie backend.
///
/// Intended for tests and embedding. Each branch is a sorted key/value map;
/// the branch root is a binary Merkle root over the sorted entries, so two
/// tries holding equal contents report equal roots regardless of write
/// order. All data is lost when the trie is dropped. Thread-safe via RwLock.
pub struct MemoryTrie {
    branches: RwLock<HashMap<BranchId, BTreeMap<ChannelsHash, Vec<u8>>>>,
}

impl MemoryTrie {
    /// Create a new empty in-memory trie.
    pub fn new() -> Self {
        Self {
            branches: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries in a branch.
    pub fn len(&self, branch: &BranchId) -> usize {
        self.branches
            .read()
            .expect("lock poisoned")
            .get(branch)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Returns `true` if the branch has no entries.
    pub fn is_empty(&self, branch: &BranchId) -> bool {
        self.len(branch) == 0
    }

    /// Returns `true` if the branch holds an entry for `hash`.
    pub fn contains(&self, branch: &BranchId, hash: &ChannelsHash) -> bool {
        self.branches
            .read()
            .expect("lock poisoned")
            .get(branch)
            .is_some_and(|entries| entries.contains_key(hash))
    }

    /// The canonical bytes stored under `hash`, if present.
    pub fn get(&self, branch: &BranchId, hash: &ChannelsHash) -> Option<Vec<u8>> {
        self.branches
            .read()
            .expect("lock poisoned")
            .get(branch)
            .and_then(|entries| entries.get(hash).cloned())
    }

    /// Generate an inclusion proof for `hash` against the branch's current
    /// root. Returns `None` if the entry is absent.
    pub fn prove(&self, branch: &BranchId, hash: &ChannelsHash) -> Option<MerkleProof> {
        let branches = self.branches.read().expect("lock poisoned");
        let entries = branches.get(branch)?;
        let index = entries.keys().position(|k| k == hash)?;
        let pairs: Vec<(ChannelsHash, &[u8])> =
            entries.iter().map(|(k, v)| (*k, v.as_slice())).collect();
        MerkleTree::from_entries(&pairs).proof(index)
    }
}

impl Default for MemoryTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl TrieStore for MemoryTrie {
    fn insert(&self, branch: &BranchId, hash: ChannelsHash, canonical: &[u8]) -> TrieResult<()> {
        let mut branches = self.branches.write().expect("lock poisoned");
        branches
            .entry(branch.clone())
            .or_default()
            .insert(hash, canonical.to_vec());
        Ok(())
    }

    fn delete(&self, branch: &BranchId, hash: ChannelsHash, _canonical: &[u8]) -> TrieResult<()> {
        let mut branches = self.branches.write().expect("lock poisoned");
        if let Some(entries) = branches.get_mut(branch) {
            entries.remove(&hash);
        }
        Ok(())
    }

    fn root(&self, branch: &BranchId) -> TrieResult<ChannelsHash> {
        let branches = self.branches.read().expect("lock poisoned");
        let Some(entries) = branches.get(branch) else {
            return Ok(ChannelsHash::null());
        };
        let pairs: Vec<(ChannelsHash, &[u8])> =
            entries.iter().map(|(k, v)| (*k, v.as_slice())).collect();
        Ok(MerkleTree::from_entries(&pairs).root())
    }
}

impl std::fmt::Debug for MemoryTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let branches = self.branches.read().expect("lock poisoned");
        f.debug_struct("MemoryTrie")
            .field("branch_count", &branches.len())
            .finish()
    }
}
