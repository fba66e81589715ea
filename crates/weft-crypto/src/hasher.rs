use serde::Serialize;

use weft_types::{codec, ChannelsHash, CodecResult};

/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag (e.g. `"weft-channels-v1"`) that is
/// prepended to every hash computation. This prevents cross-type hash
/// collisions: a channel sequence and a record with identical bytes will
/// produce different hashes.
pub struct ChannelHasher {
    domain: &'static str,
}

impl ChannelHasher {
    /// Hasher for ordered channel sequences (the channel-group key).
    pub const CHANNELS: Self = Self {
        domain: "weft-channels-v1",
    };
    /// Hasher for canonical group records (the trie mirror form).
    pub const RECORD: Self = Self {
        domain: "weft-record-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ChannelsHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ChannelsHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Derive the channel-group key from an ordered channel sequence.
    ///
    /// A pure function of the serialized byte form of the sequence: the same
    /// channels in the same order always produce the same hash, across calls
    /// and across process restarts. Order is significant. The only failure
    /// mode is a serialization failure of a malformed channel value, which
    /// is propagated rather than recovered.
    pub fn hash_channels<C: Serialize>(channels: &[C]) -> CodecResult<ChannelsHash> {
        let bytes = codec::encode(&channels)?;
        Ok(Self::CHANNELS.hash(&bytes))
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
