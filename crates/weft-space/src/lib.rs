//! Concurrent content-addressed tuple-space store.
//!
//! [`TupleSpace`] holds, per channel group, the pending data and pending
//! waiting continuations registered against those channels, plus a
//! secondary index of channel joins for discovering multi-channel
//! continuations. Records are keyed by the BLAKE3 hash of their ordered
//! channel sequence, and every record mutation is mirrored into a
//! branch-scoped Merkle trie so the store's state is independently
//! verifiable and checkpointable.
//!
//! # Concurrency
//!
//! All operations are synchronous and run on arbitrary caller threads.
//! Both indexes are sharded concurrent maps: reads and read-modify-write
//! cycles are atomic per key, but there is no cross-key atomicity. Bulk
//! restore and join cleanup consult multiple keys and must be serialized
//! against normal traffic by the caller where isolation matters.
//!
//! # Key Types
//!
//! - [`TupleSpace`] — The store: primary index, join index, trie mirror
//! - [`SpaceError`] / [`SpaceResult`] — Error surface
//! - [`MetricsSnapshot`] — Point-in-time observability read-out

pub mod error;
pub mod metrics;
pub mod store;

pub use error::{SpaceError, SpaceResult};
pub use metrics::MetricsSnapshot;
pub use store::TupleSpace;
