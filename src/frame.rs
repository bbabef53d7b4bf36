mod frame_codec;
mod frame_error;
mod frame_kind;
mod frame_mux_stream_decoder;
mod frame_stream_encoder;
mod frame_struct;

pub use frame_codec::FrameCodec;
pub use frame_error::{FrameDecodeError, FrameEncodeError};
pub use frame_kind::FrameKind;
pub use frame_mux_stream_decoder::FrameMuxStreamDecoder;
pub use frame_stream_encoder::FrameStreamEncoder;
pub use frame_struct::{DecodedFrame, Frame};
