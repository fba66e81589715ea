//! Canonical record encoding for trie mirroring.
//!
//! Two stores holding equivalent records must converge to the same trie
//! root, so the bytes written for a record have to be a deterministic
//! function of its contents. All record fields are ordered sequences whose
//! order is semantically significant (insertion history), so the canonical
//! form is simply the domain-tagged wire encoding of the record itself.

use serde::Serialize;

use weft_types::{codec, CodecResult, GroupRecord};

/// Encode a group record to its canonical trie form.
///
/// Deterministic: structurally equal records always produce equal bytes.
pub fn canonical_record_bytes<C, P, A, K>(
    record: &GroupRecord<C, P, A, K>,
) -> CodecResult<Vec<u8>>
where
    C: Serialize,
    P: Serialize,
    A: Serialize,
    K: Serialize,
{
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"weft-record-v1:");
    bytes.extend_from_slice(&codec::encode(record)?);
    Ok(bytes)
}
