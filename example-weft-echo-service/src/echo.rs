use bitcode::{Decode, Encode};
use std::io;
use weft_rpc_service::{
    MethodDescriptor, RpcMethod, RpcMethodClientStreaming, RpcMethodDuplex,
    RpcMethodServerStreaming, RpcMethodUnary,
};

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct EchoRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct EchoResponse {
    pub text: String,
}

fn decode_error(e: bitcode::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

macro_rules! echo_codec {
    ($ty:ident) => {
        impl RpcMethod for $ty {
            type Input = EchoRequest;
            type Output = EchoResponse;

            fn encode_request(input: Self::Input) -> Result<Vec<u8>, io::Error> {
                Ok(bitcode::encode(&input))
            }

            fn decode_request(bytes: &[u8]) -> Result<Self::Input, io::Error> {
                bitcode::decode::<EchoRequest>(bytes).map_err(decode_error)
            }

            fn encode_response(output: Self::Output) -> Result<Vec<u8>, io::Error> {
                Ok(bitcode::encode(&output))
            }

            fn decode_response(bytes: &[u8]) -> Result<Self::Output, io::Error> {
                bitcode::decode::<EchoResponse>(bytes).map_err(decode_error)
            }
        }
    };
}

/// Unary echo: one request in, one prefixed response out.
pub struct EchoGet;
echo_codec!(EchoGet);

impl RpcMethodUnary for EchoGet {
    const DESCRIPTOR: MethodDescriptor = MethodDescriptor::unary("/echo.Echo/Get");
}

/// Server-streaming echo: one response per whitespace-separated token of
/// the request text.
pub struct EchoExpand;
echo_codec!(EchoExpand);

impl RpcMethodServerStreaming for EchoExpand {
    const DESCRIPTOR: MethodDescriptor = MethodDescriptor::server_streaming("/echo.Echo/Expand");
}

/// Client-streaming echo: the single response joins every request text
/// with spaces.
pub struct EchoCollect;
echo_codec!(EchoCollect);

impl RpcMethodClientStreaming for EchoCollect {
    const DESCRIPTOR: MethodDescriptor = MethodDescriptor::client_streaming("/echo.Echo/Collect");
}

/// Bidirectional echo: one response per request, in order.
pub struct EchoUpdate;
echo_codec!(EchoUpdate);

impl RpcMethodDuplex for EchoUpdate {
    const DESCRIPTOR: MethodDescriptor = MethodDescriptor::duplex("/echo.Echo/Update");
}
