//! Codec errors

use thiserror::Error;

/// Errors produced while encoding or decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Length field announced more than the device protocol allows.
    #[error("frame value too large: {len} >= 509")]
    FrameTooLarge { len: usize },

    /// Value does not fit the 16-bit length field.
    #[error("frame value too long to encode: {len} > 65535")]
    ValueTooLong { len: usize },
}
