//! Incremental frame decoder.

use bytes::{Bytes, BytesMut};

use crate::error::FrameError;
use crate::frame::Frame;
use crate::tag::Tag;
use crate::MAX_VALUE_LEN;

/// Decoder phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePhase {
    AwaitingTag,
    AwaitingLength,
    AwaitingValue,
    Complete,
}

/// Per-connection decoder state for a single frame.
///
/// Feed it bytes with [`FrameDecoder::decode_step`] as they arrive. Once
/// [`FrameDecoder::is_complete`] returns true, take the frame with
/// [`FrameDecoder::into_frame`] and start over with a new decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    phase: DecodePhase,
    /// Bytes still needed to finish the current phase.
    needed: usize,
    /// Bytes received so far in the current phase.
    buffer: BytesMut,
    tag: Tag,
    value: Bytes,
    /// Set once a length field was rejected; the decoder is unusable after that.
    rejected: Option<usize>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            phase: DecodePhase::AwaitingTag,
            needed: 1,
            buffer: BytesMut::with_capacity(MAX_VALUE_LEN),
            tag: Tag::MessageBox,
            value: Bytes::new(),
            rejected: None,
        }
    }

    pub fn phase(&self) -> DecodePhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == DecodePhase::Complete
    }

    /// Bytes still needed before the current phase completes.
    pub fn needed(&self) -> usize {
        self.needed
    }

    /// Feed newly received bytes.
    ///
    /// Consumes only as many bytes as the current frame needs and returns
    /// that count; the rest of `input` belongs to the next frame. Empty
    /// input and calls on a completed decoder consume nothing.
    pub fn decode_step(&mut self, input: &[u8]) -> Result<usize, FrameError> {
        if let Some(len) = self.rejected {
            return Err(FrameError::FrameTooLarge { len });
        }

        let mut consumed = 0;
        while self.phase != DecodePhase::Complete && consumed < input.len() {
            let take = self.needed.min(input.len() - consumed);
            self.buffer
                .extend_from_slice(&input[consumed..consumed + take]);
            self.needed -= take;
            consumed += take;

            if self.needed == 0 {
                self.finish_phase()?;
            }
        }
        Ok(consumed)
    }

    fn finish_phase(&mut self) -> Result<(), FrameError> {
        match self.phase {
            DecodePhase::AwaitingTag => {
                self.tag = Tag::from(self.buffer[0]);
                self.buffer.clear();
                self.phase = DecodePhase::AwaitingLength;
                self.needed = 2;
            }
            DecodePhase::AwaitingLength => {
                let len = u16::from_le_bytes([self.buffer[0], self.buffer[1]]) as usize;
                self.buffer.clear();
                if len > MAX_VALUE_LEN {
                    self.rejected = Some(len);
                    return Err(FrameError::FrameTooLarge { len });
                }
                if len == 0 {
                    self.value = Bytes::new();
                    self.phase = DecodePhase::Complete;
                } else {
                    self.phase = DecodePhase::AwaitingValue;
                    self.needed = len;
                }
            }
            DecodePhase::AwaitingValue => {
                self.value = self.buffer.split().freeze();
                self.phase = DecodePhase::Complete;
            }
            DecodePhase::Complete => {}
        }
        Ok(())
    }

    /// The decoded frame, if decoding finished.
    pub fn into_frame(self) -> Option<Frame> {
        if self.is_complete() {
            Some(Frame {
                tag: self.tag,
                value: self.value,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;
    use proptest::prelude::*;

    fn decode_all(bytes: &[u8]) -> Frame {
        let mut decoder = FrameDecoder::new();
        let consumed = decoder.decode_step(bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        decoder.into_frame().unwrap()
    }

    #[test]
    fn test_phases_byte_by_byte() {
        let bytes = encode(Tag::Apdu, &[0x90, 0x00]).unwrap();
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.phase(), DecodePhase::AwaitingTag);

        decoder.decode_step(&bytes[0..1]).unwrap();
        assert_eq!(decoder.phase(), DecodePhase::AwaitingLength);
        assert_eq!(decoder.needed(), 2);

        decoder.decode_step(&bytes[1..2]).unwrap();
        assert_eq!(decoder.phase(), DecodePhase::AwaitingLength);
        assert_eq!(decoder.needed(), 1);

        decoder.decode_step(&bytes[2..3]).unwrap();
        assert_eq!(decoder.phase(), DecodePhase::AwaitingValue);
        assert_eq!(decoder.needed(), 2);

        decoder.decode_step(&bytes[3..4]).unwrap();
        decoder.decode_step(&bytes[4..5]).unwrap();
        assert!(decoder.is_complete());

        let frame = decoder.into_frame().unwrap();
        assert_eq!(frame.tag, Tag::Apdu);
        assert_eq!(frame.value, vec![0x90, 0x00]);
    }

    #[test]
    fn test_zero_length_value_completes_after_length() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.decode_step(&[0xFD, 0x00, 0x00]).unwrap(), 3);
        assert!(decoder.is_complete());
        let frame = decoder.into_frame().unwrap();
        assert_eq!(frame.tag, Tag::ApduLock);
        assert!(frame.value.is_empty());
    }

    #[test]
    fn test_empty_input_is_noop() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.decode_step(&[]).unwrap(), 0);
        assert_eq!(decoder.phase(), DecodePhase::AwaitingTag);
        assert_eq!(decoder.needed(), 1);
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut decoder = FrameDecoder::new();
        // 509 = 0x01FD
        let err = decoder.decode_step(&[0x00, 0xFD, 0x01]).unwrap_err();
        assert_eq!(err, FrameError::FrameTooLarge { len: 509 });
        assert_ne!(decoder.phase(), DecodePhase::AwaitingValue);

        // Stays rejected
        assert!(decoder.decode_step(&[0x01]).is_err());
        assert!(decoder.into_frame().is_none());
    }

    #[test]
    fn test_largest_accepted_length() {
        let value = vec![0x5A; MAX_VALUE_LEN];
        let bytes = encode(Tag::MessageBox, &value).unwrap();
        let frame = decode_all(&bytes);
        assert_eq!(frame.value.len(), MAX_VALUE_LEN);
    }

    #[test]
    fn test_complete_decoder_ignores_input() {
        let mut decoder = FrameDecoder::new();
        decoder.decode_step(&[0xFC, 0x00, 0x00]).unwrap();
        assert!(decoder.is_complete());
        assert_eq!(decoder.decode_step(&[0x01, 0x02]).unwrap(), 0);
        assert_eq!(decoder.into_frame().unwrap().tag, Tag::Close);
    }

    #[test]
    fn test_consumes_only_current_frame() {
        let mut stream = encode(Tag::Management, &[]).unwrap().to_vec();
        stream.extend_from_slice(&encode(Tag::Apdu, &[0x01]).unwrap());

        let mut decoder = FrameDecoder::new();
        let consumed = decoder.decode_step(&stream).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(decoder.into_frame().unwrap().tag, Tag::Management);

        let mut decoder = FrameDecoder::new();
        decoder.decode_step(&stream[consumed..]).unwrap();
        let frame = decoder.into_frame().unwrap();
        assert_eq!(frame.tag, Tag::Apdu);
        assert_eq!(frame.value, vec![0x01]);
    }

    #[test]
    fn test_incomplete_has_no_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.decode_step(&[0x00, 0x05, 0x00, b'h']).unwrap();
        assert!(decoder.into_frame().is_none());
    }

    fn arb_tag() -> impl Strategy<Value = Tag> {
        any::<u8>().prop_map(Tag::from)
    }

    proptest! {
        #[test]
        fn roundtrip(tag in arb_tag(), value in prop::collection::vec(any::<u8>(), 0..=MAX_VALUE_LEN)) {
            let bytes = encode(tag, &value).unwrap();
            let frame = decode_all(&bytes);
            prop_assert_eq!(frame.tag, tag);
            prop_assert_eq!(frame.value, value);
        }

        #[test]
        fn split_equivalence(
            tag in arb_tag(),
            value in prop::collection::vec(any::<u8>(), 0..=MAX_VALUE_LEN),
            chunk_sizes in prop::collection::vec(1usize..32, 1..64),
        ) {
            let bytes = encode(tag, &value).unwrap();
            let whole = decode_all(&bytes);

            let mut decoder = FrameDecoder::new();
            let mut offset = 0;
            let mut sizes = chunk_sizes.iter().cycle();
            while offset < bytes.len() {
                let size = (*sizes.next().unwrap()).min(bytes.len() - offset);
                let consumed = decoder.decode_step(&bytes[offset..offset + size]).unwrap();
                prop_assert_eq!(consumed, size);
                offset += size;
            }
            let pieces = decoder.into_frame().unwrap();
            prop_assert_eq!(pieces, whole);
        }

        #[test]
        fn oversized_never_awaits_value(len in 509u16..=u16::MAX, tag in arb_tag()) {
            let mut decoder = FrameDecoder::new();
            let [lo, hi] = len.to_le_bytes();
            let result = decoder.decode_step(&[u8::from(tag), lo, hi]);
            prop_assert_eq!(result, Err(FrameError::FrameTooLarge { len: len as usize }));
            prop_assert_ne!(decoder.phase(), DecodePhase::AwaitingValue);
        }
    }
}
