use std::fmt;

#[derive(Debug, PartialEq)]
pub enum FrameEncodeError {
    /// Attempted to write to a stream that has already ended.
    WriteAfterEnd,

    /// Attempted to write to a stream that was canceled prematurely.
    WriteAfterCancel,
}

impl fmt::Display for FrameEncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameEncodeError::WriteAfterEnd => write!(f, "write after stream end"),
            FrameEncodeError::WriteAfterCancel => write!(f, "write after stream cancel"),
        }
    }
}

impl std::error::Error for FrameEncodeError {}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameDecodeError {
    /// The frame header or payload did not conform to the wire layout.
    CorruptFrame,

    /// A frame arrived for a stream that already ended.
    ReadAfterEnd,

    /// A frame arrived for a stream that was canceled prematurely.
    ReadAfterCancel,

    IncompleteHeader,
}

impl fmt::Display for FrameDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDecodeError::CorruptFrame => write!(f, "corrupt frame"),
            FrameDecodeError::ReadAfterEnd => write!(f, "read after stream end"),
            FrameDecodeError::ReadAfterCancel => write!(f, "read after stream cancel"),
            FrameDecodeError::IncompleteHeader => write!(f, "incomplete frame header"),
        }
    }
}

impl std::error::Error for FrameDecodeError {}
