use crate::frame::{FrameDecodeError, FrameKind};

/// Represents a single frame of data in the multiplexed byte stream.
///
/// A frame is the basic transmission unit. It carries a header identifying
/// the logical stream it belongs to, its position within that stream, and a
/// payload whose interpretation depends on the frame kind: stream header and
/// message bytes for `Open`/`Data`, trailing metadata for `End`, an encoded
/// status for `Cancel`, and a window credit for `WindowUpdate`.
#[derive(Debug)]
pub struct Frame {
    /// Identifies the logical stream. Every call owns exactly one stream id
    /// for its lifetime; ids are scoped to their connection.
    pub stream_id: u32,

    /// The sequence number of the frame within its stream. Frames are
    /// reassembled in `seq_id` order even if the transport delivers them
    /// out of order.
    pub seq_id: u32,

    /// The frame's role within the stream lifecycle.
    pub kind: FrameKind,

    /// Local send timestamp, in microseconds since the UNIX epoch.
    pub timestamp_micros: u64,

    /// The raw payload data of the frame.
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub struct DecodedFrame {
    pub inner: Frame,
    pub decode_error: Option<FrameDecodeError>,
}
