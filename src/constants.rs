// Frame related constants
pub const FRAME_LENGTH_FIELD_SIZE: usize = 4;
pub const FRAME_STREAM_ID_OFFSET: usize = 4;
pub const FRAME_SEQ_ID_OFFSET: usize = 8;
pub const FRAME_KIND_OFFSET: usize = 12;
pub const FRAME_TIMESTAMP_OFFSET: usize = 13;
pub const FRAME_HEADER_SIZE: usize = 21;

/// Size in bytes of the envelope flag field (u8).
/// A non-zero flag marks the payload as compressed with the negotiated codec.
pub const ENVELOPE_FLAG_SIZE: usize = 1;

/// Size in bytes of the envelope length field (u32).
pub const ENVELOPE_LENGTH_FIELD_SIZE: usize = 4;

/// Total size of the envelope prefix before the message payload.
pub const ENVELOPE_HEADER_SIZE: usize = ENVELOPE_FLAG_SIZE + ENVELOPE_LENGTH_FIELD_SIZE;

/// Size in bytes of the stream header's method path length field (u16).
pub const STREAM_HEADER_PATH_LENGTH_SIZE: usize = 2;

/// Size in bytes of the stream header's metadata length field (u16).
pub const STREAM_HEADER_METADATA_LENGTH_SIZE: usize = 2;

/// Size in bytes of a `WindowUpdate` frame payload (u32 credit).
pub const WINDOW_UPDATE_PAYLOAD_SIZE: usize = 4;

/// Initial per-stream flow-control window, in bytes, for each direction.
///
/// A whole envelope is reserved atomically, so the window must admit at
/// least one maximum-size message or such a message could never be sent.
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 =
    (DEFAULT_MAX_MESSAGE_SIZE + ENVELOPE_HEADER_SIZE) as u32;

/// Largest credit a flow-control window may accumulate. Crediting past this
/// is a protocol violation.
pub const MAX_WINDOW_SIZE: u32 = (1 << 31) - 1;

/// Largest decoded message the envelope decoder will accept before
/// allocating a receive buffer.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Suffix marking a metadata key as binary-valued. Binary values are
/// base64-encoded on the wire and decoded transparently.
pub const METADATA_BINARY_KEY_SUFFIX: &str = "-bin";

/// Reserved trailing-metadata key carrying the terminal status code (decimal).
pub const STATUS_CODE_METADATA_KEY: &str = "weft-status";

/// Reserved trailing-metadata key carrying the terminal status message.
pub const STATUS_MESSAGE_METADATA_KEY: &str = "weft-message";

/// Initial-metadata key advertising accepted compression codec names.
/// Absence means identity (no compression) for that direction.
pub const ACCEPT_ENCODING_METADATA_KEY: &str = "weft-accept-encoding";
