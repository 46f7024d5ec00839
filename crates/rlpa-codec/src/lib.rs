//! # RLPA Codec
//!
//! Wire format of the RLPA device protocol.
//!
//! ## Frame Layout
//!
//! ```text
//! +0   Tag     (1 byte)
//! +1   Length  (2 bytes LE16)
//! +3   Value   (Length bytes)
//! ```
//!
//! ## Decoding
//!
//! TCP delivers frames in arbitrary pieces. [`FrameDecoder`] accumulates
//! bytes across reads and moves through its phases:
//!
//! ```text
//! AwaitingTag ──1 byte──→ AwaitingLength ──2 bytes──→ AwaitingValue ──N bytes──→ Complete
//!                                │
//!                                └── length == 0 ────────────────────────────→ Complete
//! ```
//!
//! A completed decoder never advances again; the transport replaces it with
//! a fresh instance before the next frame.
//!
//! ## Invariants
//!
//! - Encoded value length always fits in 16 bits.
//! - Received frames carry at most [`MAX_VALUE_LEN`] value bytes. The cap is
//!   enforced on decode only.
//! - The decoder buffer never holds more than the current phase requires.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod decoder;
pub mod error;
pub mod frame;
pub mod tag;

pub use decoder::{DecodePhase, FrameDecoder};
pub use error::FrameError;
pub use frame::{encode, Frame};
pub use tag::Tag;

/// Size of the tag + length header.
pub const HEADER_LEN: usize = 3;

/// Largest value length accepted on receive.
pub const MAX_VALUE_LEN: usize = 508;

