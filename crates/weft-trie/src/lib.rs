//! Branch-scoped Merkle trie boundary for the Weft tuple space.
//!
//! The tuple-space store mirrors every record mutation into a backing trie
//! so its state is independently verifiable and checkpointable. This crate
//! defines that boundary and ships a reference in-memory backend.
//!
//! # Key Types
//!
//! - [`TrieStore`] — The abstract insert/delete/root interface
//! - [`BranchId`] — Caller-supplied branch identifier scoping all writes
//! - [`MemoryTrie`] — In-memory backend with a real Merkle root, for tests
//!   and embedding
//! - [`MerkleTree`] / [`MerkleProof`] — Binary Merkle tree with inclusion
//!   proofs, used by [`MemoryTrie`] to compute roots

pub mod branch;
pub mod error;
pub mod memory;
pub mod merkle;
pub mod traits;

pub use branch::BranchId;
pub use error::{TrieError, TrieResult};
pub use memory::MemoryTrie;
pub use merkle::{MerkleProof, MerkleTree, Side};
pub use traits::TrieStore;
