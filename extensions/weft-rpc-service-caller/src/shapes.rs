use crate::call::{RpcCall, RpcInboundCall, RpcRequestSink};
use std::marker::PhantomData;
use weft::metadata::Metadata;
use weft::status::Status;
use weft_rpc_service::RpcMethod;

fn decode_failure(e: std::io::Error) -> Status {
    Status::internal(format!("response decode failed: {e}"))
}

fn encode_failure(e: std::io::Error) -> Status {
    Status::internal(format!("request encode failed: {e}"))
}

/// Typed view over a streaming response.
///
/// Yields decoded messages until the peer half-closes; a non-OK terminal
/// status is yielded once as the final item. After `next` returns `None`
/// the terminal status was OK.
pub struct RpcResponseStream<M: RpcMethod> {
    inbound: RpcInboundCall,
    finished: bool,
    _marker: PhantomData<fn() -> M>,
}

impl<M: RpcMethod> RpcResponseStream<M> {
    pub(crate) fn new(inbound: RpcInboundCall) -> Self {
        Self {
            inbound,
            finished: false,
            _marker: PhantomData,
        }
    }

    pub async fn initial_metadata(&mut self) -> Option<Metadata> {
        self.inbound.initial_metadata().await
    }

    pub async fn next(&mut self) -> Option<Result<M::Output, Status>> {
        if self.finished {
            return None;
        }
        match self.inbound.next_message().await {
            Some(bytes) => match M::decode_response(&bytes) {
                Ok(output) => Some(Ok(output)),
                Err(e) => {
                    self.finished = true;
                    let status = decode_failure(e);
                    self.inbound.abort_with(status.clone());
                    Some(Err(status))
                }
            },
            None => {
                self.finished = true;
                let status = self.inbound.wait_status().await;
                if status.is_ok() { None } else { Some(Err(status)) }
            }
        }
    }

    /// The terminal status, after the stream has been drained.
    pub async fn status(mut self) -> Status {
        self.inbound.wait_status().await
    }
}

/// Typed handle for a client-streaming call: send any number of requests,
/// then `finish` to half-close and collect the single response.
pub struct RpcClientStreamCall<M: RpcMethod> {
    sink: RpcRequestSink,
    inbound: RpcInboundCall,
    _marker: PhantomData<fn() -> M>,
}

impl<M: RpcMethod> RpcClientStreamCall<M> {
    pub(crate) fn new(call: RpcCall) -> Self {
        Self {
            sink: call.sink,
            inbound: call.inbound,
            _marker: PhantomData,
        }
    }

    pub async fn send(&self, input: M::Input) -> Result<(), Status> {
        let bytes = M::encode_request(input).map_err(encode_failure)?;
        self.sink.send(bytes).await
    }

    pub async fn finish(mut self) -> Result<M::Output, Status> {
        self.sink.close()?;
        let bytes = self.inbound.recv_single().await?;
        M::decode_response(&bytes).map_err(decode_failure)
    }
}

/// Typed handle for a bidirectional call. Sending and receiving are
/// independent; close the sender when done, then drain responses to the
/// terminal status.
pub struct RpcDuplexCall<M: RpcMethod> {
    sink: RpcRequestSink,
    responses: RpcResponseStream<M>,
}

impl<M: RpcMethod> RpcDuplexCall<M> {
    pub(crate) fn new(call: RpcCall) -> Self {
        Self {
            sink: call.sink,
            responses: RpcResponseStream::new(call.inbound),
        }
    }

    pub async fn send(&self, input: M::Input) -> Result<(), Status> {
        let bytes = M::encode_request(input).map_err(encode_failure)?;
        self.sink.send(bytes).await
    }

    /// Half-closes the request side; the server sees end-of-input.
    pub fn close_sender(&self) -> Result<(), Status> {
        self.sink.close()
    }

    pub async fn next(&mut self) -> Option<Result<M::Output, Status>> {
        self.responses.next().await
    }

    pub async fn status(self) -> Status {
        self.responses.status().await
    }
}
