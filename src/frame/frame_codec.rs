use crate::{
    constants::{
        FRAME_HEADER_SIZE, FRAME_KIND_OFFSET, FRAME_LENGTH_FIELD_SIZE, FRAME_SEQ_ID_OFFSET,
        FRAME_STREAM_ID_OFFSET, FRAME_TIMESTAMP_OFFSET,
    },
    frame::{DecodedFrame, Frame, FrameDecodeError, FrameKind},
};

/// Provides encoding and decoding functionality for frames.
///
/// The `FrameCodec` serializes a `Frame` into a byte stream and parses a byte
/// stream back into a `Frame`. All header fields are little-endian. The
/// length field counts payload bytes only.
pub struct FrameCodec;

impl FrameCodec {
    /// Encodes a `Frame` into a byte vector ready for transmission.
    pub fn encode(frame: &Frame) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + frame.payload.len());

        // Payload length first so partial reads can be sized up front
        buf.extend(&(frame.payload.len() as u32).to_le_bytes());

        buf.extend(&frame.stream_id.to_le_bytes());
        buf.extend(&frame.seq_id.to_le_bytes());
        buf.push(frame.kind as u8);
        buf.extend(&frame.timestamp_micros.to_le_bytes());
        buf.extend(&frame.payload);

        buf
    }

    /// Decodes a byte slice into a `Frame`.
    ///
    /// The buffer must contain a complete frame (header plus the payload
    /// length the header declares); otherwise `IncompleteHeader` is
    /// returned. An unknown frame kind is treated as corruption.
    pub fn decode(buf: &[u8]) -> Result<DecodedFrame, FrameDecodeError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(FrameDecodeError::IncompleteHeader);
        }

        // Slice conversions below cannot fail once the length check passed.
        let len = u32::from_le_bytes(buf[0..FRAME_LENGTH_FIELD_SIZE].try_into().unwrap()) as usize;

        if buf.len() < FRAME_HEADER_SIZE + len {
            return Err(FrameDecodeError::IncompleteHeader);
        }

        let stream_id = u32::from_le_bytes(
            buf[FRAME_STREAM_ID_OFFSET..FRAME_SEQ_ID_OFFSET]
                .try_into()
                .unwrap(),
        );
        let seq_id = u32::from_le_bytes(
            buf[FRAME_SEQ_ID_OFFSET..FRAME_KIND_OFFSET]
                .try_into()
                .unwrap(),
        );
        let kind = FrameKind::try_from(buf[FRAME_KIND_OFFSET])
            .map_err(|_| FrameDecodeError::CorruptFrame)?;

        let timestamp = u64::from_le_bytes(
            buf[FRAME_TIMESTAMP_OFFSET..FRAME_HEADER_SIZE]
                .try_into()
                .unwrap(),
        );

        let frame = Frame {
            stream_id,
            seq_id,
            kind,
            timestamp_micros: timestamp,
            payload: buf[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len].to_vec(),
        };

        Ok(DecodedFrame {
            inner: frame,
            decode_error: None,
        })
    }
}
