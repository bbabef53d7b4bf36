use crate::call::{RpcCall, start_call_on};
use crate::call_options::CallOptions;
use crate::shapes::{RpcClientStreamCall, RpcDuplexCall, RpcResponseStream};
use std::sync::{Arc, Mutex};
use weft::status::Status;
use weft::stream::MuxDispatcher;
use weft_rpc_service::{
    RpcMethodClientStreaming, RpcMethodDuplex, RpcMethodServerStreaming, RpcMethodUnary,
};

/// Defines a generic capability for making RPC calls.
///
/// Any struct that can provide a shared [`MuxDispatcher`] and an emit
/// function for raw outbound bytes (a connected client, or a server acting
/// as a client) implements the three getters and gains all four call
/// shapes.
///
/// Dispatcher locking is brief and synchronous: opening a stream, feeding
/// received bytes, and crediting windows. Nothing awaits while holding it.
#[async_trait::async_trait]
pub trait RpcServiceCallerInterface: Send + Sync {
    /// The connection's dispatcher, shared with its read task.
    fn get_dispatcher(&self) -> Arc<Mutex<MuxDispatcher>>;

    /// The function that hands raw bytes to the underlying transport.
    fn get_emit_fn(&self) -> Arc<dyn Fn(Vec<u8>) + Send + Sync>;

    fn is_connected(&self) -> bool;

    /// Opens a raw call. The shape methods below are thin typed wrappers
    /// over this; generated stubs may also use it directly.
    async fn start_call(
        &self,
        path: &str,
        client_streaming: bool,
        server_streaming: bool,
        options: CallOptions,
    ) -> Result<RpcCall, Status> {
        if !self.is_connected() {
            return Err(Status::unavailable("transport is not connected"));
        }
        start_call_on(
            &self.get_dispatcher(),
            self.get_emit_fn(),
            path,
            client_streaming,
            server_streaming,
            options,
        )
    }

    /// Single request, single response.
    async fn call_unary<M>(&self, input: M::Input, options: CallOptions) -> Result<M::Output, Status>
    where
        M: RpcMethodUnary + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
    {
        let payload =
            M::encode_request(input).map_err(|e| Status::internal(format!("request encode failed: {e}")))?;

        let call = self
            .start_call(M::DESCRIPTOR.path, false, false, options)
            .await?;
        call.sink.send(payload).await?;
        call.sink.close()?;

        let mut inbound = call.inbound;
        let bytes = inbound.recv_single().await?;
        M::decode_response(&bytes).map_err(|e| Status::internal(format!("response decode failed: {e}")))
    }

    /// Single request, streaming response.
    async fn call_server_streaming<M>(
        &self,
        input: M::Input,
        options: CallOptions,
    ) -> Result<RpcResponseStream<M>, Status>
    where
        M: RpcMethodServerStreaming + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
    {
        let payload =
            M::encode_request(input).map_err(|e| Status::internal(format!("request encode failed: {e}")))?;

        let call = self
            .start_call(M::DESCRIPTOR.path, false, true, options)
            .await?;
        call.sink.send(payload).await?;
        call.sink.close()?;

        Ok(RpcResponseStream::new(call.inbound))
    }

    /// Streaming request, single response.
    async fn call_client_streaming<M>(
        &self,
        options: CallOptions,
    ) -> Result<RpcClientStreamCall<M>, Status>
    where
        M: RpcMethodClientStreaming + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
    {
        let call = self
            .start_call(M::DESCRIPTOR.path, true, false, options)
            .await?;
        Ok(RpcClientStreamCall::new(call))
    }

    /// Streaming both ways.
    async fn call_duplex<M>(&self, options: CallOptions) -> Result<RpcDuplexCall<M>, Status>
    where
        M: RpcMethodDuplex + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
    {
        let call = self
            .start_call(M::DESCRIPTOR.path, true, true, options)
            .await?;
        Ok(RpcDuplexCall::new(call))
    }
}
