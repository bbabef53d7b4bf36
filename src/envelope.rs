use crate::constants::{ENVELOPE_HEADER_SIZE, ENVELOPE_LENGTH_FIELD_SIZE};
use std::fmt;

/// The length-prefixed, optionally compressed framing unit carrying one
/// serialized message.
///
/// Wire layout: `[flag:u8][len:u32 LE][payload]`. A non-zero flag marks
/// the payload as compressed with the codec negotiated for the connection;
/// the envelope layer only carries the marker, it never inspects the
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub compressed: bool,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// The number of bytes this envelope occupies on the wire. Flow-control
    /// windows are debited and credited in wire bytes.
    pub fn wire_size(&self) -> usize {
        ENVELOPE_HEADER_SIZE + self.payload.len()
    }

    /// Serializes the envelope into its wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_size());
        buf.push(self.compressed as u8);
        buf.extend(&(self.payload.len() as u32).to_le_bytes());
        buf.extend(&self.payload);
        buf
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeDecodeError {
    /// The declared payload length exceeds the configured maximum. Raised
    /// before any payload-sized allocation happens.
    MessageTooLarge { declared: usize, max: usize },

    /// The envelope flag byte is neither 0 nor 1.
    CorruptEnvelope,

    /// The envelope is marked compressed but the connection negotiated no
    /// compression codec.
    UnexpectedCompression,
}

impl fmt::Display for EnvelopeDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeDecodeError::MessageTooLarge { declared, max } => {
                write!(f, "message of {declared} bytes exceeds limit of {max} bytes")
            }
            EnvelopeDecodeError::CorruptEnvelope => write!(f, "corrupt envelope header"),
            EnvelopeDecodeError::UnexpectedCompression => {
                write!(f, "compressed envelope without negotiated codec")
            }
        }
    }
}

impl std::error::Error for EnvelopeDecodeError {}

/// A resumable envelope parser.
///
/// The transport may deliver bytes in arbitrary chunk sizes; `read_bytes`
/// buffers partial envelopes and emits each complete one exactly once.
/// Decoding has no side effects beyond the internal buffer, so a stream of
/// envelopes decodes identically regardless of how its bytes were chunked.
pub struct EnvelopeDecoder {
    buffer: Vec<u8>,
    max_message_size: usize,
    accept_compressed: bool,
}

impl EnvelopeDecoder {
    pub fn new(max_message_size: usize, accept_compressed: bool) -> Self {
        Self {
            buffer: Vec::new(),
            max_message_size,
            accept_compressed,
        }
    }

    /// True when no partial envelope is buffered.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Feeds bytes in, returning every envelope completed by them.
    pub fn read_bytes(&mut self, data: &[u8]) -> Result<Vec<Envelope>, EnvelopeDecodeError> {
        self.buffer.extend_from_slice(data);
        let mut envelopes = Vec::new();

        while self.buffer.len() >= ENVELOPE_HEADER_SIZE {
            let flag = self.buffer[0];
            if flag > 1 {
                return Err(EnvelopeDecodeError::CorruptEnvelope);
            }
            let compressed = flag == 1;
            if compressed && !self.accept_compressed {
                return Err(EnvelopeDecodeError::UnexpectedCompression);
            }

            let declared = u32::from_le_bytes(
                self.buffer[1..1 + ENVELOPE_LENGTH_FIELD_SIZE]
                    .try_into()
                    .unwrap(),
            ) as usize;

            // Size check happens on the declared length, before the payload
            // is buffered or copied.
            if declared > self.max_message_size {
                return Err(EnvelopeDecodeError::MessageTooLarge {
                    declared,
                    max: self.max_message_size,
                });
            }

            let total = ENVELOPE_HEADER_SIZE + declared;
            if self.buffer.len() < total {
                break;
            }

            let payload = self.buffer[ENVELOPE_HEADER_SIZE..total].to_vec();
            self.buffer.drain(..total);

            envelopes.push(Envelope {
                compressed,
                payload,
            });
        }

        Ok(envelopes)
    }
}
