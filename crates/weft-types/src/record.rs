use serde::{Deserialize, Serialize};

/// A value published on a channel group, awaiting a matching continuation.
///
/// The `persistent` flag marks data that should survive a match. The store
/// itself never branches on it; it is carried for the matching engine above
/// and round-trips through serialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datum<A> {
    pub payload: A,
    pub persistent: bool,
}

impl<A> Datum<A> {
    /// Create a non-persistent datum.
    pub fn new(payload: A) -> Self {
        Self {
            payload,
            persistent: false,
        }
    }

    /// Create a persistent datum.
    pub fn persistent(payload: A) -> Self {
        Self {
            payload,
            persistent: true,
        }
    }
}

/// A registered consumer: one pattern per channel of the group, plus the
/// continuation payload to run when the patterns match available data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingContinuation<P, K> {
    /// Match patterns, same arity as the group's channel sequence.
    pub patterns: Vec<P>,
    /// The continuation payload. Treated as an opaque value by the store.
    pub continuation: K,
    pub persistent: bool,
}

impl<P, K> WaitingContinuation<P, K> {
    /// Create a non-persistent waiting continuation.
    pub fn new(patterns: Vec<P>, continuation: K) -> Self {
        Self {
            patterns,
            continuation,
            persistent: false,
        }
    }

    /// Create a persistent waiting continuation.
    pub fn persistent(patterns: Vec<P>, continuation: K) -> Self {
        Self {
            patterns,
            continuation,
            persistent: true,
        }
    }
}

/// The per-channel-group record: channels, pending data, and pending
/// waiting continuations.
///
/// `channels` is immutable once the record exists for a key — it is the
/// key's preimage. `data` and `continuations` mutate by insert-at-front and
/// remove-by-index; their order is insertion history, and consumers decide
/// priority policy.
///
/// A record present in a store must have non-empty `data` or non-empty
/// `continuations`. A record with both empty is orphaned and is evicted
/// eagerly, never lazily tolerated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord<C, P, A, K> {
    pub channels: Vec<C>,
    pub data: Vec<Datum<A>>,
    pub continuations: Vec<WaitingContinuation<P, K>>,
}

impl<C, P, A, K> GroupRecord<C, P, A, K> {
    /// Create a record from its parts.
    pub fn new(
        channels: Vec<C>,
        data: Vec<Datum<A>>,
        continuations: Vec<WaitingContinuation<P, K>>,
    ) -> Self {
        Self {
            channels,
            data,
            continuations,
        }
    }

    /// Number of channels in the group.
    pub fn arity(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the record holds no data and no continuations.
    pub fn is_orphaned(&self) -> bool {
        self.data.is_empty() && self.continuations.is_empty()
    }
}
