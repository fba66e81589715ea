//! Error types for the tuple-space store.

use thiserror::Error;
use weft_trie::TrieError;
use weft_types::CodecError;

/// Errors that can occur during tuple-space operations.
#[derive(Debug, Error)]
pub enum SpaceError {
    /// The store has been closed; no further operations are accepted.
    #[error("tuple space is closed")]
    Closed,

    /// A removal index was out of range for the target record.
    #[error("removal index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Encoding or decoding a value failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The trie mirror write failed; the enclosing mutation was aborted.
    #[error("trie mirror error: {0}")]
    Trie(#[from] TrieError),
}

/// Convenience alias for tuple-space results.
pub type SpaceResult<T> = Result<T, SpaceError>;
