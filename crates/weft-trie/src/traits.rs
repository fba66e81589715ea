use weft_types::ChannelsHash;

use crate::branch::BranchId;
use crate::error::TrieResult;

/// Branch-scoped Merkle key/value store.
///
/// All implementations must satisfy these invariants:
/// - Inserting an identical canonical record under the same key is a no-op
///   at the trie-root level (idempotent).
/// - Deleting a key that is not present is tolerated, not an error.
/// - Writes under one branch never affect another branch's root.
/// - The store never interprets the canonical bytes — it is a pure
///   key/value store keyed by channel-group hash.
///
/// Implementations must not call back into the tuple-space store: mirror
/// writes happen while a per-key entry guard is held.
pub trait TrieStore: Send + Sync {
    /// Insert (or replace) the canonical record bytes under `hash`.
    fn insert(&self, branch: &BranchId, hash: ChannelsHash, canonical: &[u8]) -> TrieResult<()>;

    /// Delete the entry under `hash`. The canonical bytes of the record
    /// being dropped are supplied for backends that log or verify deletes;
    /// deleting an absent key is a no-op.
    fn delete(&self, branch: &BranchId, hash: ChannelsHash, canonical: &[u8]) -> TrieResult<()>;

    /// The Merkle root of the branch. An unknown or empty branch has the
    /// null root.
    fn root(&self, branch: &BranchId) -> TrieResult<ChannelsHash>;
}
