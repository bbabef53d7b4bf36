mod flow_control;
mod mux_dispatcher;
mod mux_session;
mod stream_decoder;
mod stream_encoder;
mod stream_error;
mod stream_event;
mod stream_header;
mod stream_state;
pub mod stream_trait;

pub use flow_control::{FlowControlError, FlowWindow};
pub use mux_dispatcher::MuxDispatcher;
pub use mux_session::{MuxSession, SessionConfig, SessionRole};
pub use stream_decoder::StreamDecoder;
pub use stream_encoder::StreamEncoder;
pub use stream_error::{StreamDecodeError, StreamSendError};
pub use stream_event::StreamEvent;
pub use stream_header::StreamHeader;
pub use stream_state::{StreamState, StreamStateError};
