use thiserror::Error;

/// Errors from trie store operations.
#[derive(Debug, Error)]
pub enum TrieError {
    /// The underlying storage backend failed.
    #[error("trie backend error: {0}")]
    Backend(String),

    /// I/O error from a durable backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for trie operations.
pub type TrieResult<T> = Result<T, TrieError>;
