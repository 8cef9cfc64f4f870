//! Frame type combining header and payload.
//!
//! A `Frame` is the transport-layer packet: a 16-byte raw binary header
//! followed by already-encoded payload bytes. For typed access see
//! [`Payload::into_frame`](crate::Payload::into_frame) and
//! [`Payload::from_frame`](crate::Payload::from_frame).

use bytes::{BufMut, Bytes};

use crate::{
    ChainId, FrameHeader, MessageType,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame
///
/// Layout on the wire: `[FrameHeader: 16 bytes] + [payload: variable bytes]`
///
/// # Invariants
///
/// - `payload.len()` matches `header.payload_size()`; enforced by
///   [`Frame::new`] and verified by [`Frame::decode`].
/// - `payload.len()` never exceeds [`FrameHeader::MAX_PAYLOAD_SIZE`] on the
///   wire; oversized frames are rejected by [`Frame::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Raw payload bytes (CBOR-encoded)
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame, setting the header's payload size to match.
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        // Oversized payloads saturate here and are rejected by `encode`.
        let payload_len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        header.payload_size = payload_len.to_be_bytes();

        Self { header, payload }
    }

    /// Message type, `None` if unrecognized.
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        self.header.message_type()
    }

    /// Conversation this frame belongs to.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        self.header.chain_id()
    }

    /// Encode frame into buffer
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if payload exceeds
    ///   `MAX_PAYLOAD_SIZE`
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Decode a frame from a complete wire buffer. Trailing bytes beyond the
    /// declared payload are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if header parsing fails
    /// - `ProtocolError::FrameTooShort` if the payload is truncated
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = *FrameHeader::from_bytes(bytes)?;
        let payload_size = header.payload_size() as usize;
        let total = FrameHeader::SIZE + payload_size;

        if bytes.len() < total {
            return Err(ProtocolError::FrameTooShort { expected: total, actual: bytes.len() });
        }

        let payload = Bytes::copy_from_slice(&bytes[FrameHeader::SIZE..total]);
        Ok(Self { header, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_size_follows_payload() {
        let frame = Frame::new(FrameHeader::new(MessageType::Happy), vec![1, 2, 3, 4]);
        assert_eq!(frame.header.payload_size(), 4);

        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();
        assert_eq!(wire.len(), FrameHeader::SIZE + 4);
        assert_eq!(Frame::decode(&wire).unwrap(), frame);
    }

    #[test]
    fn reject_truncated_frame() {
        let frame = Frame::new(FrameHeader::new(MessageType::Happy), vec![0u8; 100]);
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();
        wire.truncate(FrameHeader::SIZE + 50);

        assert_eq!(
            Frame::decode(&wire),
            Err(ProtocolError::FrameTooShort { expected: FrameHeader::SIZE + 100, actual: 66 })
        );
    }

    #[test]
    fn reject_oversized_encode() {
        let payload = vec![0u8; FrameHeader::MAX_PAYLOAD_SIZE as usize + 1];
        let frame = Frame::new(FrameHeader::new(MessageType::Happy), payload);

        let mut wire = Vec::new();
        assert!(matches!(frame.encode(&mut wire), Err(ProtocolError::PayloadTooLarge { .. })));
        assert!(wire.is_empty());
    }
}
