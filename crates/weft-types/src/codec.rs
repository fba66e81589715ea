//! The shared wire encoding for channels, patterns, data, and continuations.
//!
//! Every Weft crate serializes through these two functions so that a given
//! value always produces the same bytes: channel-group hashing and trie
//! canonicalization both depend on it. The wire form is bincode.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors from encoding or decoding a value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encode a value to its wire form.
///
/// Deterministic: the same value always encodes to the same bytes.
pub fn encode<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a value from its wire form.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
