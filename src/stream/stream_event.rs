use crate::envelope::Envelope;
use crate::metadata::Metadata;
use crate::status::Status;
use crate::stream::{StreamDecodeError, StreamHeader};

/// Events produced while decoding a connection's inbound bytes.
///
/// For one stream, events always arrive in lifecycle order: `Opened`, then
/// zero or more `Message`s, then exactly one of `Trailers` or `Canceled`.
/// Events for different streams interleave freely. `WindowUpdate` reports
/// credit returned by the peer for the local send direction and can arrive
/// at any point while the stream is live.
#[derive(Debug)]
pub enum StreamEvent {
    Opened {
        stream_id: u32,
        header: StreamHeader,
    },
    Message {
        stream_id: u32,
        envelope: Envelope,
    },
    /// The peer half-closed: no further messages will arrive.
    Trailers {
        stream_id: u32,
        trailers: Metadata,
    },
    /// The peer reset the stream out of band.
    Canceled {
        stream_id: u32,
        status: Status,
    },
    WindowUpdate {
        stream_id: u32,
        credited: u32,
    },
    Error {
        stream_id: Option<u32>,
        error: StreamDecodeError,
    },
}

impl StreamEvent {
    pub fn stream_id(&self) -> Option<u32> {
        match self {
            StreamEvent::Opened { stream_id, .. }
            | StreamEvent::Message { stream_id, .. }
            | StreamEvent::Trailers { stream_id, .. }
            | StreamEvent::Canceled { stream_id, .. }
            | StreamEvent::WindowUpdate { stream_id, .. } => Some(*stream_id),
            StreamEvent::Error { stream_id, .. } => *stream_id,
        }
    }
}
