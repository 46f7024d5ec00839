//! Frame type and encoder.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::tag::Tag;
use crate::HEADER_LEN;

/// A decoded or to-be-sent RLPA frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: Tag,
    pub value: Bytes,
}

impl Frame {
    pub fn new(tag: Tag, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Frame with an empty value (control frames).
    pub fn empty(tag: Tag) -> Self {
        Self::new(tag, Bytes::new())
    }

    pub fn encode(&self) -> Result<Bytes, FrameError> {
        encode(self.tag, &self.value)
    }
}

/// Encode `[tag][len LE16][value]`.
///
/// Fails only when `value` does not fit the 16-bit length field. The
/// receive-side size cap does not apply here.
pub fn encode(tag: Tag, value: &[u8]) -> Result<Bytes, FrameError> {
    let len = u16::try_from(value.len())
        .map_err(|_| FrameError::ValueTooLong { len: value.len() })?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + value.len());
    buf.put_u8(tag.into());
    buf.put_u16_le(len);
    buf.put_slice(value);
    Ok(buf.freeze())
}
