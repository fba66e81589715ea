//! Deterministic hashing and canonical encoding for the Weft tuple space.
//!
//! Provides the domain-separated BLAKE3 hasher that derives a channel
//! group's identity from its ordered channel sequence, and the canonical
//! record encoding used when mirroring records into the backing trie.
//!
//! All hashing wraps an established library — no custom cryptography.

pub mod canonical;
pub mod hasher;

pub use canonical::canonical_record_bytes;
pub use hasher::ChannelHasher;
