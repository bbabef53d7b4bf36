use std::fmt;
use weft::frame::FrameEncodeError;
use weft::stream::StreamDecodeError;

#[derive(Debug)]
pub enum RpcServiceEndpointError {
    Decode(StreamDecodeError),
    Encode(FrameEncodeError),
    Handler(Box<dyn std::error::Error + Send + Sync>),

    /// A handler is already registered for this method path.
    DuplicateMethod(String),
}

impl fmt::Display for RpcServiceEndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcServiceEndpointError::Decode(e) => write!(f, "decode error: {e}"),
            RpcServiceEndpointError::Encode(e) => write!(f, "encode error: {e}"),
            RpcServiceEndpointError::Handler(e) => write!(f, "handler error: {e}"),
            RpcServiceEndpointError::DuplicateMethod(path) => {
                write!(f, "a handler for method {path:?} is already registered")
            }
        }
    }
}

impl std::error::Error for RpcServiceEndpointError {}

impl From<StreamDecodeError> for RpcServiceEndpointError {
    fn from(err: StreamDecodeError) -> Self {
        RpcServiceEndpointError::Decode(err)
    }
}

impl From<FrameEncodeError> for RpcServiceEndpointError {
    fn from(err: FrameEncodeError) -> Self {
        RpcServiceEndpointError::Encode(err)
    }
}
