use std::io;

/// Wire-level identity and shape of one RPC method.
///
/// The path is the wire-visible `/package.Service/Method` string produced
/// by code generation; the runtime treats it as an opaque, case-sensitive
/// routing key. The two streaming flags fix the call's cardinality on each
/// side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub path: &'static str,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

impl MethodDescriptor {
    pub const fn unary(path: &'static str) -> Self {
        Self {
            path,
            client_streaming: false,
            server_streaming: false,
        }
    }

    pub const fn client_streaming(path: &'static str) -> Self {
        Self {
            path,
            client_streaming: true,
            server_streaming: false,
        }
    }

    pub const fn server_streaming(path: &'static str) -> Self {
        Self {
            path,
            client_streaming: false,
            server_streaming: true,
        }
    }

    pub const fn duplex(path: &'static str) -> Self {
        Self {
            path,
            client_streaming: true,
            server_streaming: true,
        }
    }
}

/// Serialization capability of one RPC method.
///
/// Generated stubs implement this once per method; the runtime never sees
/// anything but bytes. Encoding errors surface as `io::Error` and are
/// mapped to `Internal` by the call runtime.
pub trait RpcMethod {
    /// The high-level request type.
    type Input;

    /// The high-level response type.
    type Output;

    fn encode_request(input: Self::Input) -> Result<Vec<u8>, io::Error>;

    fn decode_request(bytes: &[u8]) -> Result<Self::Input, io::Error>;

    fn encode_response(output: Self::Output) -> Result<Vec<u8>, io::Error>;

    fn decode_response(bytes: &[u8]) -> Result<Self::Output, io::Error>;
}

/// Marker for single-request, single-response methods.
pub trait RpcMethodUnary: RpcMethod {
    const DESCRIPTOR: MethodDescriptor;
}

/// Marker for streaming-request, single-response methods.
pub trait RpcMethodClientStreaming: RpcMethod {
    const DESCRIPTOR: MethodDescriptor;
}

/// Marker for single-request, streaming-response methods.
pub trait RpcMethodServerStreaming: RpcMethod {
    const DESCRIPTOR: MethodDescriptor;
}

/// Marker for bidirectional streaming methods.
pub trait RpcMethodDuplex: RpcMethod {
    const DESCRIPTOR: MethodDescriptor;
}
