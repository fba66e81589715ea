//! Foundation types for the Weft tuple space.
//!
//! This crate provides the core identity and record types used throughout
//! the Weft system. Every other Weft crate depends on `weft-types`.
//!
//! # Key Types
//!
//! - [`ChannelsHash`] — Content-addressed identifier for a channel group
//!   (BLAKE3 hash of the ordered channel sequence)
//! - [`Datum`] — A value published on a channel group, awaiting a match
//! - [`WaitingContinuation`] — A registered consumer: patterns plus a
//!   continuation payload
//! - [`GroupRecord`] — The per-channel-group record bundling channels,
//!   data, and continuations

pub mod codec;
pub mod error;
pub mod key;
pub mod record;

pub use codec::{CodecError, CodecResult};
pub use error::TypeError;
pub use key::ChannelsHash;
pub use record::{Datum, GroupRecord, WaitingContinuation};
