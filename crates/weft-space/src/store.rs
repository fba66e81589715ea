//! The tuple-space store: primary index, join index, and trie mirror.
//!
//! The primary index maps a channel-group hash to its [`GroupRecord`]; the
//! join index maps a single channel to the channel groups that registered a
//! continuation spanning it. Every record mutation (except `install` and
//! `clear`) mirrors the full updated record into the backing trie within the
//! same logical operation, and the orphan rule is enforced synchronously
//! after every removal: a record with no data and no continuations is never
//! observably present.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use weft_crypto::{canonical_record_bytes, ChannelHasher};
use weft_trie::{BranchId, TrieStore};
use weft_types::{codec, ChannelsHash, Datum, GroupRecord, WaitingContinuation};

use crate::error::{SpaceError, SpaceResult};
use crate::metrics::{MetricsSnapshot, SpaceMetrics};

/// Concurrent content-addressed tuple-space store.
///
/// Generic over the channel (`C`), pattern (`P`), datum payload (`A`), and
/// continuation payload (`K`) types. All four are opaque values to the
/// store; they only need to serialize deterministically (for hashing and
/// trie canonicalization) and clone (reads hand out owned copies, so
/// callers can never mutate stored state in place).
///
/// Per-key operations are atomic: the trie mirror write happens while the
/// key's entry guard is held and the new record is only published after the
/// mirror succeeds, so in-memory state never runs ahead of the trie for a
/// key. There is no cross-key atomicity anywhere in this store.
pub struct TupleSpace<C, P, A, K> {
    /// Primary index: channel-group hash to record.
    index: DashMap<ChannelsHash, GroupRecord<C, P, A, K>>,
    /// Join index: single channel to the groups spanning it.
    joins: DashMap<C, Vec<Vec<C>>>,
    /// The backing trie every record mutation is mirrored into.
    trie: Arc<dyn TrieStore>,
    /// The trie branch this store writes under.
    branch: BranchId,
    closed: AtomicBool,
    metrics: SpaceMetrics,
}

impl<C, P, A, K> TupleSpace<C, P, A, K>
where
    C: Clone + Eq + Hash + Serialize,
    P: Clone + Serialize,
    A: Clone + Serialize,
    K: Clone + Serialize,
{
    /// Create a store mirroring into `trie` under `branch`.
    pub fn new(trie: Arc<dyn TrieStore>, branch: BranchId) -> Self {
        Self {
            index: DashMap::new(),
            joins: DashMap::new(),
            trie,
            branch,
            closed: AtomicBool::new(false),
            metrics: SpaceMetrics::new(),
        }
    }

    /// The trie branch this store writes under.
    pub fn branch(&self) -> &BranchId {
        &self.branch
    }

    /// Mark the store closed. Every subsequent operation fails fast with
    /// [`SpaceError::Closed`] before touching any index. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        debug!(branch = %self.branch, "tuple space closed");
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Point-in-time metrics read-out.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.index.len(), self.joins.len())
    }

    fn ensure_open(&self) -> SpaceResult<()> {
        if self.is_closed() {
            return Err(SpaceError::Closed);
        }
        Ok(())
    }

    fn hash_of(&self, channels: &[C]) -> SpaceResult<ChannelsHash> {
        Ok(ChannelHasher::hash_channels(channels)?)
    }

    // ---------------------------------------------------------------
    // Primary index: reads
    // ---------------------------------------------------------------

    /// The channel sequence stored under `hash`, if a record exists.
    /// Pure lookup; never mutates.
    pub fn get_channels(&self, hash: &ChannelsHash) -> SpaceResult<Option<Vec<C>>> {
        self.ensure_open()?;
        Ok(self.index.get(hash).map(|record| record.channels.clone()))
    }

    /// The pending data for a channel group, in insertion-history order
    /// (most recent first). Empty if no record exists.
    pub fn get_data(&self, channels: &[C]) -> SpaceResult<Vec<Datum<A>>> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        Ok(self
            .index
            .get(&hash)
            .map(|record| record.data.clone())
            .unwrap_or_default())
    }

    /// The pending waiting continuations for a channel group.
    ///
    /// Returns owned copies: stored continuations are never handed out by
    /// reference, so callers cannot mutate stored state in place. Callers
    /// that only need the match patterns should use
    /// [`get_patterns`](Self::get_patterns) and skip the payload copy.
    pub fn get_continuations(
        &self,
        channels: &[C],
    ) -> SpaceResult<Vec<WaitingContinuation<P, K>>> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        Ok(self
            .index
            .get(&hash)
            .map(|record| record.continuations.clone())
            .unwrap_or_default())
    }

    /// The match patterns of each pending continuation, without copying the
    /// continuation payloads.
    pub fn get_patterns(&self, channels: &[C]) -> SpaceResult<Vec<Vec<P>>> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        Ok(self
            .index
            .get(&hash)
            .map(|record| {
                record
                    .continuations
                    .iter()
                    .map(|k| k.patterns.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    // ---------------------------------------------------------------
    // Primary index: mutation
    // ---------------------------------------------------------------

    /// Publish a datum on a channel group.
    ///
    /// Front-inserts into the existing record, or creates a fresh record
    /// for a previously absent key. The full updated record is mirrored to
    /// the trie as an insert.
    pub fn put_datum(&self, channels: &[C], datum: Datum<A>) -> SpaceResult<()> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        match self.index.entry(hash) {
            Entry::Occupied(mut occupied) => {
                let mut record = occupied.get().clone();
                record.data.insert(0, datum);
                self.mirror_insert(hash, &record)?;
                occupied.insert(record);
            }
            Entry::Vacant(vacant) => {
                let record = GroupRecord::new(channels.to_vec(), vec![datum], Vec::new());
                self.mirror_insert(hash, &record)?;
                vacant.insert(record);
            }
        }
        self.metrics.datum_put();
        Ok(())
    }

    /// Register a waiting continuation on a channel group.
    ///
    /// Symmetric to [`put_datum`](Self::put_datum) over the continuation
    /// list.
    pub fn put_continuation(
        &self,
        channels: &[C],
        continuation: WaitingContinuation<P, K>,
    ) -> SpaceResult<()> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        match self.index.entry(hash) {
            Entry::Occupied(mut occupied) => {
                let mut record = occupied.get().clone();
                record.continuations.insert(0, continuation);
                self.mirror_insert(hash, &record)?;
                occupied.insert(record);
            }
            Entry::Vacant(vacant) => {
                let record =
                    GroupRecord::new(channels.to_vec(), Vec::new(), vec![continuation]);
                self.mirror_insert(hash, &record)?;
                vacant.insert(record);
            }
        }
        self.metrics.continuation_put();
        Ok(())
    }

    /// Remove the datum at `index` from a channel group's record.
    ///
    /// An absent record is a no-op; an out-of-range index is an error. The
    /// orphan rule runs synchronously after the removal: an orphaned record
    /// is evicted and mirrored as a delete, otherwise the updated record is
    /// mirrored as an insert.
    pub fn remove_datum(&self, channels: &[C], index: usize) -> SpaceResult<()> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        let Entry::Occupied(mut occupied) = self.index.entry(hash) else {
            return Ok(());
        };
        let mut record = occupied.get().clone();
        if index >= record.data.len() {
            return Err(SpaceError::IndexOutOfBounds {
                index,
                len: record.data.len(),
            });
        }
        record.data.remove(index);
        if record.is_orphaned() {
            self.mirror_delete(hash, &record)?;
            occupied.remove();
            self.metrics.orphan_evicted();
        } else {
            self.mirror_insert(hash, &record)?;
            occupied.insert(record);
        }
        self.metrics.datum_removed();
        Ok(())
    }

    /// Remove the waiting continuation at `index` from a channel group's
    /// record. Symmetric to [`remove_datum`](Self::remove_datum).
    pub fn remove_continuation(&self, channels: &[C], index: usize) -> SpaceResult<()> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        let Entry::Occupied(mut occupied) = self.index.entry(hash) else {
            return Ok(());
        };
        let mut record = occupied.get().clone();
        if index >= record.continuations.len() {
            return Err(SpaceError::IndexOutOfBounds {
                index,
                len: record.continuations.len(),
            });
        }
        record.continuations.remove(index);
        if record.is_orphaned() {
            self.mirror_delete(hash, &record)?;
            occupied.remove();
            self.metrics.orphan_evicted();
        } else {
            self.mirror_insert(hash, &record)?;
            occupied.insert(record);
        }
        self.metrics.continuation_removed();
        Ok(())
    }

    /// Unconditionally overwrite the record for a channel group with a
    /// fresh one holding only `continuation`.
    ///
    /// Bootstrap-only path for known-empty groups (system-level
    /// registration): no trie mirror, no orphan check.
    pub fn install_continuation(
        &self,
        channels: &[C],
        continuation: WaitingContinuation<P, K>,
    ) -> SpaceResult<()> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        let record = GroupRecord::new(channels.to_vec(), Vec::new(), vec![continuation]);
        self.index.insert(hash, record);
        self.metrics.install();
        debug!(hash = %hash.short_hex(), "installed continuation");
        Ok(())
    }

    /// Atomically empty both indexes. The trie is untouched: history is
    /// preserved, only the in-memory view resets.
    pub fn clear(&self) -> SpaceResult<()> {
        self.ensure_open()?;
        self.index.clear();
        self.joins.clear();
        debug!(branch = %self.branch, "tuple space cleared");
        Ok(())
    }

    /// Returns `true` iff both the primary and join indexes are empty.
    pub fn is_empty(&self) -> SpaceResult<bool> {
        self.ensure_open()?;
        Ok(self.index.is_empty() && self.joins.is_empty())
    }

    /// A point-in-time copy of the primary index, keyed by channel
    /// sequence.
    ///
    /// Read-committed only: no lock is held across the whole map, so
    /// concurrent writers may be partially visible.
    pub fn snapshot(
        &self,
    ) -> SpaceResult<HashMap<Vec<C>, (Vec<Datum<A>>, Vec<WaitingContinuation<P, K>>)>> {
        self.ensure_open()?;
        let mut map = HashMap::with_capacity(self.index.len());
        for entry in self.index.iter() {
            let record = entry.value();
            map.insert(
                record.channels.clone(),
                (record.data.clone(), record.continuations.clone()),
            );
        }
        Ok(map)
    }

    // ---------------------------------------------------------------
    // Join index
    // ---------------------------------------------------------------

    /// The channel groups known to span `channel`, most recently added
    /// first. Empty if none were ever registered.
    pub fn get_joins(&self, channel: &C) -> SpaceResult<Vec<Vec<C>>> {
        self.ensure_open()?;
        Ok(self
            .joins
            .get(channel)
            .map(|groups| groups.value().clone())
            .unwrap_or_default())
    }

    /// Record that the group `channels` spans `channel`.
    ///
    /// Duplicates are suppressed by structural equality; a fresh group is
    /// front-inserted. Atomic per channel key, so concurrent calls for the
    /// same channel never lose an entry.
    pub fn add_join(&self, channel: &C, channels: &[C]) -> SpaceResult<()> {
        self.ensure_open()?;
        self.insert_join(channel, channels);
        Ok(())
    }

    /// Prune the group `channels` from `channel`'s join list, but only once
    /// the group has no continuations left in the primary index — join
    /// bookkeeping deliberately lags continuation removal. When the prune
    /// empties the list, the channel's entry is deleted entirely.
    pub fn remove_join(&self, channel: &C, channels: &[C]) -> SpaceResult<()> {
        self.ensure_open()?;
        let hash = self.hash_of(channels)?;
        // Consult the primary index before taking the join entry guard:
        // no operation holds guards on both maps at once.
        let has_continuations = self
            .index
            .get(&hash)
            .map(|record| !record.continuations.is_empty())
            .unwrap_or(false);
        if has_continuations {
            return Ok(());
        }
        if let Entry::Occupied(mut occupied) = self.joins.entry(channel.clone()) {
            let groups = occupied.get_mut();
            groups.retain(|group| group.as_slice() != channels);
            if groups.is_empty() {
                occupied.remove();
            }
        }
        Ok(())
    }

    /// A materialized, re-keyed view of the whole join index for external
    /// consumers that need hash-addressable join data. Each single-channel
    /// key is re-hashed as a singleton sequence.
    pub fn join_map(&self) -> SpaceResult<HashMap<ChannelsHash, Vec<Vec<C>>>> {
        self.ensure_open()?;
        let mut map = HashMap::with_capacity(self.joins.len());
        for entry in self.joins.iter() {
            let hash = ChannelHasher::hash_channels(std::slice::from_ref(entry.key()))?;
            map.insert(hash, entry.value().clone());
        }
        Ok(map)
    }

    fn insert_join(&self, channel: &C, channels: &[C]) {
        match self.joins.entry(channel.clone()) {
            Entry::Occupied(mut occupied) => {
                let groups = occupied.get_mut();
                if !groups.iter().any(|group| group.as_slice() == channels) {
                    groups.insert(0, channels.to_vec());
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(vec![channels.to_vec()]);
            }
        }
    }

    // ---------------------------------------------------------------
    // Bulk restore
    // ---------------------------------------------------------------

    /// Install records directly from an external snapshot, overwriting any
    /// existing entries, and re-derive join bookkeeping from the supplied
    /// continuations.
    ///
    /// Does not mirror to the trie: the snapshot is assumed to already be
    /// trie-consistent. Not safe to interleave with concurrent single-key
    /// mutation of the same keys; callers serialize restore against normal
    /// traffic.
    pub fn bulk_insert(
        &self,
        records: Vec<(ChannelsHash, GroupRecord<C, P, A, K>)>,
    ) -> SpaceResult<()> {
        self.ensure_open()?;
        for (hash, record) in records {
            let channels = record.channels.clone();
            let has_continuations = !record.continuations.is_empty();
            self.index.insert(hash, record);
            if has_continuations {
                for channel in &channels {
                    self.insert_join(channel, &channels);
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Trie mirror
    // ---------------------------------------------------------------

    fn mirror_insert(
        &self,
        hash: ChannelsHash,
        record: &GroupRecord<C, P, A, K>,
    ) -> SpaceResult<()> {
        let canonical = canonical_record_bytes(record)?;
        self.trie.insert(&self.branch, hash, &canonical)?;
        self.trace_mirror("insert", hash, record, canonical.len());
        Ok(())
    }

    fn mirror_delete(
        &self,
        hash: ChannelsHash,
        record: &GroupRecord<C, P, A, K>,
    ) -> SpaceResult<()> {
        let canonical = canonical_record_bytes(record)?;
        self.trie.delete(&self.branch, hash, &canonical)?;
        self.trace_mirror("delete", hash, record, canonical.len());
        Ok(())
    }

    fn trace_mirror(
        &self,
        op: &'static str,
        hash: ChannelsHash,
        record: &GroupRecord<C, P, A, K>,
        record_bytes: usize,
    ) {
        // The per-section byte sizes cost an extra encode each; only pay
        // for them when debug output is actually enabled.
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let data_bytes = codec::encode(&record.data).map(|b| b.len()).unwrap_or(0);
        let continuation_bytes = codec::encode(&record.continuations)
            .map(|b| b.len())
            .unwrap_or(0);
        debug!(
            hash = %hash.short_hex(),
            op,
            record_bytes,
            data_count = record.data.len(),
            data_bytes,
            continuation_count = record.continuations.len(),
            continuation_bytes,
            "mirrored record"
        );
    }
}

impl<C: Eq + Hash, P, A, K> std::fmt::Debug for TupleSpace<C, P, A, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleSpace")
            .field("branch", &self.branch)
            .field("records", &self.index.len())
            .field("join_channels", &self.joins.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use weft_trie::{MemoryTrie, TrieError, TrieResult};

    type TestSpace = TupleSpace<String, String, i32, String>;

    fn chans(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn cont(patterns: &[&str], payload: &str) -> WaitingContinuation<String, String> {
        WaitingContinuation::new(chans(patterns), payload.to_string())
    }

    fn branch() -> BranchId {
        BranchId::new("test")
    }

    fn space() -> (TestSpace, Arc<MemoryTrie>) {
        let trie = Arc::new(MemoryTrie::new());
        let store = TupleSpace::new(Arc::clone(&trie) as Arc<dyn TrieStore>, branch());
        (store, trie)
    }

    /// Trie wrapper counting mirror operations.
    #[derive(Default)]
    struct RecordingTrie {
        inner: MemoryTrie,
        inserts: AtomicUsize,
        deletes: AtomicUsize,
    }

    impl TrieStore for RecordingTrie {
        fn insert(
            &self,
            branch: &BranchId,
            hash: ChannelsHash,
            canonical: &[u8],
        ) -> TrieResult<()> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(branch, hash, canonical)
        }

        fn delete(
            &self,
            branch: &BranchId,
            hash: ChannelsHash,
            canonical: &[u8],
        ) -> TrieResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(branch, hash, canonical)
        }

        fn root(&self, branch: &BranchId) -> TrieResult<ChannelsHash> {
            self.inner.root(branch)
        }
    }

    /// Trie that starts working and can be switched to fail every write.
    #[derive(Default)]
    struct FlakyTrie {
        inner: MemoryTrie,
        failing: AtomicBool,
    }

    impl FlakyTrie {
        fn fail_from_now_on(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        fn check(&self) -> TrieResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(TrieError::Backend("injected failure".to_string()));
            }
            Ok(())
        }
    }

    impl TrieStore for FlakyTrie {
        fn insert(
            &self,
            branch: &BranchId,
            hash: ChannelsHash,
            canonical: &[u8],
        ) -> TrieResult<()> {
            self.check()?;
            self.inner.insert(branch, hash, canonical)
        }

        fn delete(
            &self,
            branch: &BranchId,
            hash: ChannelsHash,
            canonical: &[u8],
        ) -> TrieResult<()> {
            self.check()?;
            self.inner.delete(branch, hash, canonical)
        }

        fn root(&self, branch: &BranchId) -> TrieResult<ChannelsHash> {
            self.inner.root(branch)
        }
    }

    // ---------------------------------------------------------------
    // Put / get round-trips
    // ---------------------------------------------------------------

    #[test]
    fn new_space_is_empty() {
        let (store, _) = space();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.metrics().records, 0);
    }

    #[test]
    fn put_then_get_data_most_recent_first() {
        let (store, _) = space();
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store.put_datum(&cs, Datum::new(2)).unwrap();

        let data = store.get_data(&cs).unwrap();
        assert_eq!(data, vec![Datum::new(2), Datum::new(1)]);
    }

    #[test]
    fn get_data_of_absent_group_is_empty() {
        let (store, _) = space();
        assert!(store.get_data(&chans(&["nowhere"])).unwrap().is_empty());
    }

    #[test]
    fn removal_scenario_evicts_the_drained_record() {
        let (store, _) = space();
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store.put_datum(&cs, Datum::new(2)).unwrap();

        store.remove_datum(&cs, 0).unwrap();
        assert_eq!(store.get_data(&cs).unwrap(), vec![Datum::new(1)]);

        store.remove_datum(&cs, 0).unwrap();
        assert!(store.get_data(&cs).unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn put_continuation_then_get() {
        let (store, _) = space();
        let cs = chans(&["x", "y"]);

        store.put_continuation(&cs, cont(&["p1", "p2"], "k1")).unwrap();
        store.put_continuation(&cs, cont(&["q1", "q2"], "k2")).unwrap();

        let conts = store.get_continuations(&cs).unwrap();
        assert_eq!(conts.len(), 2);
        assert_eq!(conts[0].continuation, "k2");
        assert_eq!(conts[1].continuation, "k1");
    }

    #[test]
    fn get_continuations_hands_out_owned_copies() {
        let (store, _) = space();
        let cs = chans(&["x"]);
        store.put_continuation(&cs, cont(&["p"], "k")).unwrap();

        let mut copy = store.get_continuations(&cs).unwrap();
        copy[0].continuation = "mutated".to_string();
        copy.clear();

        let stored = store.get_continuations(&cs).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].continuation, "k");
    }

    #[test]
    fn get_patterns_returns_patterns_only() {
        let (store, _) = space();
        let cs = chans(&["x", "y"]);
        store.put_continuation(&cs, cont(&["p1", "p2"], "k")).unwrap();

        let patterns = store.get_patterns(&cs).unwrap();
        assert_eq!(patterns, vec![chans(&["p1", "p2"])]);
    }

    #[test]
    fn get_channels_recovers_the_key_preimage() {
        let (store, _) = space();
        let cs = chans(&["a", "b", "c"]);
        store.put_datum(&cs, Datum::new(9)).unwrap();

        let hash = ChannelHasher::hash_channels(&cs).unwrap();
        assert_eq!(store.get_channels(&hash).unwrap(), Some(cs));
        assert_eq!(
            store.get_channels(&ChannelsHash::from_hash([9u8; 32])).unwrap(),
            None
        );
    }

    #[test]
    fn persistence_flags_are_stored() {
        let (store, _) = space();
        let cs = chans(&["x"]);
        store.put_datum(&cs, Datum::persistent(5)).unwrap();

        let data = store.get_data(&cs).unwrap();
        assert!(data[0].persistent);
    }

    // ---------------------------------------------------------------
    // Removal edge cases and orphan eviction
    // ---------------------------------------------------------------

    #[test]
    fn remove_datum_on_absent_record_is_a_noop() {
        let (store, _) = space();
        store.remove_datum(&chans(&["nowhere"]), 0).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn remove_datum_out_of_range_errors() {
        let (store, _) = space();
        let cs = chans(&["x"]);
        store.put_datum(&cs, Datum::new(1)).unwrap();

        let result = store.remove_datum(&cs, 5);
        assert!(matches!(
            result,
            Err(SpaceError::IndexOutOfBounds { index: 5, len: 1 })
        ));
        // The record is untouched.
        assert_eq!(store.get_data(&cs).unwrap().len(), 1);
    }

    #[test]
    fn remove_continuation_out_of_range_errors() {
        let (store, _) = space();
        let cs = chans(&["x"]);
        store.put_continuation(&cs, cont(&["p"], "k")).unwrap();

        let result = store.remove_continuation(&cs, 1);
        assert!(matches!(
            result,
            Err(SpaceError::IndexOutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn orphan_eviction_mirrors_exactly_one_delete() {
        let trie = Arc::new(RecordingTrie::default());
        let store: TestSpace =
            TupleSpace::new(Arc::clone(&trie) as Arc<dyn TrieStore>, branch());
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store.put_continuation(&cs, cont(&["p"], "k")).unwrap();

        store.remove_datum(&cs, 0).unwrap();
        assert_eq!(trie.deletes.load(Ordering::SeqCst), 0);

        store.remove_continuation(&cs, 0).unwrap();
        assert_eq!(trie.deletes.load(Ordering::SeqCst), 1);

        assert!(store.get_data(&cs).unwrap().is_empty());
        assert!(store.get_continuations(&cs).unwrap().is_empty());
        assert!(store.is_empty().unwrap());
        assert!(trie.inner.root(&branch()).unwrap().is_null());
    }

    #[test]
    fn orphan_eviction_in_the_other_order() {
        let trie = Arc::new(RecordingTrie::default());
        let store: TestSpace =
            TupleSpace::new(Arc::clone(&trie) as Arc<dyn TrieStore>, branch());
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store.put_continuation(&cs, cont(&["p"], "k")).unwrap();

        store.remove_continuation(&cs, 0).unwrap();
        store.remove_datum(&cs, 0).unwrap();

        assert_eq!(trie.deletes.load(Ordering::SeqCst), 1);
        assert!(store.is_empty().unwrap());
        assert_eq!(store.metrics().orphans_evicted, 1);
    }

    #[test]
    fn partial_removal_keeps_the_record() {
        let (store, trie) = space();
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store.put_datum(&cs, Datum::new(2)).unwrap();
        store.remove_datum(&cs, 0).unwrap();

        assert!(!store.is_empty().unwrap());
        let hash = ChannelHasher::hash_channels(&cs).unwrap();
        assert!(trie.contains(&branch(), &hash));
    }

    // ---------------------------------------------------------------
    // Trie mirroring
    // ---------------------------------------------------------------

    #[test]
    fn every_put_mirrors_the_full_updated_record() {
        let trie = Arc::new(RecordingTrie::default());
        let store: TestSpace =
            TupleSpace::new(Arc::clone(&trie) as Arc<dyn TrieStore>, branch());
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store.put_datum(&cs, Datum::new(2)).unwrap();
        assert_eq!(trie.inserts.load(Ordering::SeqCst), 2);

        // The trie holds the canonical form of the current record, not a
        // delta.
        let hash = ChannelHasher::hash_channels(&cs).unwrap();
        let canonical = trie.inner.get(&branch(), &hash).unwrap();
        let encoded = canonical
            .strip_prefix(b"weft-record-v1:".as_slice())
            .expect("canonical bytes carry the domain tag");
        let record: GroupRecord<String, String, i32, String> =
            codec::decode(encoded).unwrap();
        assert_eq!(record.data.len(), 2);
        assert_eq!(record.channels, cs);
    }

    #[test]
    fn converged_stores_share_a_trie_root() {
        let (s1, t1) = space();
        let (s2, t2) = space();
        let cs = chans(&["x", "y"]);

        // Different operation histories, same final record.
        s1.put_datum(&cs, Datum::new(1)).unwrap();
        s2.put_datum(&cs, Datum::new(2)).unwrap();
        s2.remove_datum(&cs, 0).unwrap();
        s2.put_datum(&cs, Datum::new(1)).unwrap();

        assert_eq!(
            t1.root(&branch()).unwrap(),
            t2.root(&branch()).unwrap()
        );
    }

    #[test]
    fn trie_failure_aborts_the_mutation() {
        let trie = Arc::new(FlakyTrie::default());
        let store: TestSpace =
            TupleSpace::new(Arc::clone(&trie) as Arc<dyn TrieStore>, branch());
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        trie.fail_from_now_on();

        assert!(matches!(
            store.put_datum(&cs, Datum::new(2)),
            Err(SpaceError::Trie(_))
        ));
        // The failed put was not published in memory.
        assert_eq!(store.get_data(&cs).unwrap(), vec![Datum::new(1)]);

        assert!(matches!(
            store.remove_datum(&cs, 0),
            Err(SpaceError::Trie(_))
        ));
        assert_eq!(store.get_data(&cs).unwrap().len(), 1);
    }

    #[test]
    fn install_overwrites_and_skips_the_trie() {
        let trie = Arc::new(RecordingTrie::default());
        let store: TestSpace =
            TupleSpace::new(Arc::clone(&trie) as Arc<dyn TrieStore>, branch());
        let cs = chans(&["sys"]);

        store.install_continuation(&cs, cont(&["p"], "boot")).unwrap();
        assert_eq!(trie.inserts.load(Ordering::SeqCst), 0);
        assert_eq!(trie.deletes.load(Ordering::SeqCst), 0);

        // Overwrites whatever was there.
        store.install_continuation(&cs, cont(&["p"], "boot2")).unwrap();
        let conts = store.get_continuations(&cs).unwrap();
        assert_eq!(conts.len(), 1);
        assert_eq!(conts[0].continuation, "boot2");
        assert!(store.get_data(&cs).unwrap().is_empty());
    }

    #[test]
    fn clear_resets_memory_but_preserves_trie_history() {
        let (store, trie) = space();
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store.add_join(&"x".to_string(), &cs).unwrap();
        let root = trie.root(&branch()).unwrap();

        store.clear().unwrap();

        assert!(store.is_empty().unwrap());
        assert!(store.get_joins(&"x".to_string()).unwrap().is_empty());
        assert_eq!(trie.root(&branch()).unwrap(), root);
    }

    // ---------------------------------------------------------------
    // Join index
    // ---------------------------------------------------------------

    #[test]
    fn add_join_front_inserts_new_groups() {
        let (store, _) = space();
        let x = "x".to_string();

        store.add_join(&x, &chans(&["x", "y"])).unwrap();
        store.add_join(&x, &chans(&["x", "z"])).unwrap();

        let joins = store.get_joins(&x).unwrap();
        assert_eq!(joins, vec![chans(&["x", "z"]), chans(&["x", "y"])]);
    }

    #[test]
    fn add_join_is_idempotent() {
        let (store, _) = space();
        let x = "x".to_string();
        let cs = chans(&["x", "y"]);

        store.add_join(&x, &cs).unwrap();
        store.add_join(&x, &cs).unwrap();

        assert_eq!(store.get_joins(&x).unwrap(), vec![cs]);
    }

    #[test]
    fn multi_channel_continuation_is_visible_from_every_channel() {
        let (store, _) = space();
        let cs = chans(&["x", "y"]);

        store.put_continuation(&cs, cont(&["p1", "p2"], "k")).unwrap();
        store.add_join(&"x".to_string(), &cs).unwrap();
        store.add_join(&"y".to_string(), &cs).unwrap();

        assert_eq!(store.get_joins(&"x".to_string()).unwrap(), vec![cs.clone()]);
        assert_eq!(store.get_joins(&"y".to_string()).unwrap(), vec![cs]);
    }

    #[test]
    fn remove_join_lags_behind_continuation_removal() {
        let (store, _) = space();
        let x = "x".to_string();
        let cs = chans(&["x", "y"]);

        store.put_continuation(&cs, cont(&["p1", "p2"], "k")).unwrap();
        store.add_join(&x, &cs).unwrap();

        // A continuation still exists: the prune is a no-op.
        store.remove_join(&x, &cs).unwrap();
        assert_eq!(store.get_joins(&x).unwrap(), vec![cs.clone()]);

        store.remove_continuation(&cs, 0).unwrap();

        // Now the group is inert and the prune succeeds; the emptied
        // per-channel entry is deleted outright.
        store.remove_join(&x, &cs).unwrap();
        assert!(store.get_joins(&x).unwrap().is_empty());
        assert_eq!(store.metrics().join_channels, 0);
    }

    #[test]
    fn remove_join_keeps_other_groups() {
        let (store, _) = space();
        let x = "x".to_string();

        store.add_join(&x, &chans(&["x", "y"])).unwrap();
        store.add_join(&x, &chans(&["x", "z"])).unwrap();

        store.remove_join(&x, &chans(&["x", "y"])).unwrap();
        assert_eq!(store.get_joins(&x).unwrap(), vec![chans(&["x", "z"])]);
    }

    #[test]
    fn join_map_rekeys_by_singleton_hash() {
        let (store, _) = space();
        let x = "x".to_string();
        let cs = chans(&["x", "y"]);
        store.add_join(&x, &cs).unwrap();

        let map = store.join_map().unwrap();
        let key = ChannelHasher::hash_channels(std::slice::from_ref(&x)).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&key), Some(&vec![cs]));
    }

    // ---------------------------------------------------------------
    // Bulk restore
    // ---------------------------------------------------------------

    #[test]
    fn bulk_insert_matches_incremental_construction() {
        let cs_xy = chans(&["x", "y"]);
        let cs_z = chans(&["z"]);

        // Incremental store.
        let (incremental, _) = space();
        incremental
            .put_continuation(&cs_xy, cont(&["p1", "p2"], "k"))
            .unwrap();
        incremental.add_join(&"x".to_string(), &cs_xy).unwrap();
        incremental.add_join(&"y".to_string(), &cs_xy).unwrap();
        incremental.put_datum(&cs_z, Datum::new(7)).unwrap();

        // Restored store, fed the same records in bulk.
        let (restored, _) = space();
        let records = vec![
            (
                ChannelHasher::hash_channels(&cs_xy).unwrap(),
                GroupRecord::new(
                    cs_xy.clone(),
                    vec![],
                    vec![cont(&["p1", "p2"], "k")],
                ),
            ),
            (
                ChannelHasher::hash_channels(&cs_z).unwrap(),
                GroupRecord::new(cs_z.clone(), vec![Datum::new(7)], vec![]),
            ),
        ];
        restored.bulk_insert(records).unwrap();

        assert_eq!(
            restored.snapshot().unwrap(),
            incremental.snapshot().unwrap()
        );
        assert_eq!(
            restored.join_map().unwrap(),
            incremental.join_map().unwrap()
        );
    }

    #[test]
    fn bulk_insert_does_not_touch_the_trie() {
        let trie = Arc::new(RecordingTrie::default());
        let store: TestSpace =
            TupleSpace::new(Arc::clone(&trie) as Arc<dyn TrieStore>, branch());
        let cs = chans(&["x"]);

        store
            .bulk_insert(vec![(
                ChannelHasher::hash_channels(&cs).unwrap(),
                GroupRecord::new(cs, vec![Datum::new(1)], vec![]),
            )])
            .unwrap();

        assert_eq!(trie.inserts.load(Ordering::SeqCst), 0);
        assert_eq!(trie.deletes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn bulk_insert_overwrites_existing_records() {
        let (store, _) = space();
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store
            .bulk_insert(vec![(
                ChannelHasher::hash_channels(&cs).unwrap(),
                GroupRecord::new(cs.clone(), vec![Datum::new(42)], vec![]),
            )])
            .unwrap();

        assert_eq!(store.get_data(&cs).unwrap(), vec![Datum::new(42)]);
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    #[test]
    fn closed_store_fails_fast_everywhere() {
        let (store, _) = space();
        let cs = chans(&["x"]);
        store.put_datum(&cs, Datum::new(1)).unwrap();

        store.close();
        assert!(store.is_closed());

        assert!(matches!(
            store.put_datum(&cs, Datum::new(2)),
            Err(SpaceError::Closed)
        ));
        assert!(matches!(store.get_data(&cs), Err(SpaceError::Closed)));
        assert!(matches!(store.remove_datum(&cs, 0), Err(SpaceError::Closed)));
        assert!(matches!(
            store.add_join(&"x".to_string(), &cs),
            Err(SpaceError::Closed)
        ));
        assert!(matches!(store.snapshot(), Err(SpaceError::Closed)));
        assert!(matches!(store.clear(), Err(SpaceError::Closed)));
        assert!(matches!(store.is_empty(), Err(SpaceError::Closed)));

        store.close(); // idempotent
    }

    // ---------------------------------------------------------------
    // Metrics
    // ---------------------------------------------------------------

    #[test]
    fn metrics_track_mutations() {
        let (store, _) = space();
        let cs = chans(&["x"]);

        store.put_datum(&cs, Datum::new(1)).unwrap();
        store.put_continuation(&cs, cont(&["p"], "k")).unwrap();
        store.remove_datum(&cs, 0).unwrap();

        let snap = store.metrics();
        assert_eq!(snap.records, 1);
        assert_eq!(snap.datums_put, 1);
        assert_eq!(snap.continuations_put, 1);
        assert_eq!(snap.datums_removed, 1);
        assert_eq!(snap.orphans_evicted, 0);
    }

    // ---------------------------------------------------------------
    // Concurrency
    // ---------------------------------------------------------------

    #[test]
    fn concurrent_puts_land_all_data() {
        use std::thread;

        let (store, _) = space();
        let store = Arc::new(store);
        let cs = chans(&["shared"]);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                let cs = cs.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        store.put_datum(&cs, Datum::new(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        assert_eq!(store.get_data(&cs).unwrap().len(), 200);
        assert_eq!(store.metrics().records, 1);
    }

    #[test]
    fn concurrent_add_join_never_duplicates() {
        use std::thread;

        let (store, _) = space();
        let store = Arc::new(store);
        let cs = chans(&["x", "y"]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let cs = cs.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        store.add_join(&"x".to_string(), &cs).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        assert_eq!(store.get_joins(&"x".to_string()).unwrap().len(), 1);
    }
}
