use crate::envelope::EnvelopeDecodeError;
use crate::frame::{FrameDecodeError, FrameEncodeError};
use crate::metadata::MetadataError;
use crate::status::Status;
use crate::stream::StreamState;
use std::fmt;

/// Failure while sending on a stream.
#[derive(Debug, PartialEq)]
pub enum StreamSendError {
    /// The outbound flow-control window cannot fit the message. Nothing was
    /// sent or buffered; retry after a window update.
    WouldBlock { requested: u32, available: u32 },

    /// The stream's local side is not writable in its current state.
    InvalidState(StreamState),

    Encode(FrameEncodeError),
}

impl fmt::Display for StreamSendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSendError::WouldBlock {
                requested,
                available,
            } => write!(
                f,
                "send window exhausted ({requested} bytes requested, {available} available)"
            ),
            StreamSendError::InvalidState(state) => {
                write!(f, "stream not writable in state {state:?}")
            }
            StreamSendError::Encode(e) => write!(f, "frame encode failed: {e}"),
        }
    }
}

impl std::error::Error for StreamSendError {}

impl From<FrameEncodeError> for StreamSendError {
    fn from(e: FrameEncodeError) -> Self {
        StreamSendError::Encode(e)
    }
}

/// Failure while decoding a stream's inbound bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDecodeError {
    Frame(FrameDecodeError),
    Envelope(EnvelopeDecodeError),
    Metadata(MetadataError),

    /// The stream header block is malformed.
    CorruptHeader,

    /// The stream ended mid-envelope.
    TruncatedMessage,

    /// The peer sent more message bytes than its receive window allowed.
    FlowViolation,
}

impl fmt::Display for StreamDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamDecodeError::Frame(e) => write!(f, "frame decode failed: {e}"),
            StreamDecodeError::Envelope(e) => write!(f, "envelope decode failed: {e}"),
            StreamDecodeError::Metadata(e) => write!(f, "metadata decode failed: {e}"),
            StreamDecodeError::CorruptHeader => write!(f, "corrupt stream header"),
            StreamDecodeError::TruncatedMessage => write!(f, "stream ended mid-message"),
            StreamDecodeError::FlowViolation => write!(f, "peer overran its flow-control window"),
        }
    }
}

impl std::error::Error for StreamDecodeError {}

impl From<FrameDecodeError> for StreamDecodeError {
    fn from(e: FrameDecodeError) -> Self {
        StreamDecodeError::Frame(e)
    }
}

impl From<EnvelopeDecodeError> for StreamDecodeError {
    fn from(e: EnvelopeDecodeError) -> Self {
        StreamDecodeError::Envelope(e)
    }
}

impl From<MetadataError> for StreamDecodeError {
    fn from(e: MetadataError) -> Self {
        StreamDecodeError::Metadata(e)
    }
}

/// Maps a per-stream protocol violation onto the terminal status the call
/// observes: oversized messages exhaust resources, compression the
/// connection never negotiated is unimplemented, everything else is an
/// internal protocol error.
impl From<StreamDecodeError> for Status {
    fn from(e: StreamDecodeError) -> Self {
        match &e {
            StreamDecodeError::Envelope(EnvelopeDecodeError::MessageTooLarge { .. }) => {
                Status::resource_exhausted(e.to_string())
            }
            StreamDecodeError::Envelope(EnvelopeDecodeError::UnexpectedCompression) => {
                Status::unimplemented(e.to_string())
            }
            _ => Status::internal(e.to_string()),
        }
    }
}
