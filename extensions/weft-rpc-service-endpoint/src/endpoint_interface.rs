use crate::connection::{ActiveStream, ServerConnection};
use crate::endpoint::{RegisteredMethod, RpcServiceEndpoint};
use crate::error::RpcServiceEndpointError;
use crate::handler::{
    BoxedEmit, RequestStream, ResponseSink, ServerHandlerFn, StreamingResponder,
    TypedRequestStream, status_from_handler_error,
};
use crate::interceptor::{
    ServerCallContext, ServerInterceptor, ServerNext, ServerNextFuture,
};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use weft::metadata::Metadata;
use weft::status::Status;
use weft::stream::{StreamEvent, StreamHeader};
use weft_rpc_service::{
    MethodDescriptor, RpcMethodClientStreaming, RpcMethodDuplex, RpcMethodServerStreaming,
    RpcMethodUnary,
};

/// The server dispatcher capability: a method registry, a server
/// interceptor chain, and the logic that turns a connection's bytes into
/// independently running handler tasks.
#[async_trait::async_trait]
pub trait RpcServiceEndpointInterface<C>: Send + Sync
where
    C: Send + Sync + Clone + 'static,
{
    fn get_handlers(&self) -> Arc<Mutex<HashMap<String, RegisteredMethod<C>>>>;

    fn get_interceptors(&self) -> Arc<Mutex<Vec<Arc<dyn ServerInterceptor>>>>;

    /// Appends a server interceptor. First registered is entered first on
    /// dispatch; the chain is fixed per call once dispatch begins.
    fn add_interceptor(&self, interceptor: Arc<dyn ServerInterceptor>) {
        self.get_interceptors().lock().unwrap().push(interceptor);
    }

    /// Registers the erased form of a handler under its descriptor's path.
    fn register_handler(
        &self,
        descriptor: MethodDescriptor,
        handler: ServerHandlerFn<C>,
    ) -> Result<(), RpcServiceEndpointError> {
        let handlers = self.get_handlers();
        let mut handlers = handlers.lock().unwrap();
        match handlers.entry(descriptor.path.to_string()) {
            Entry::Occupied(_) => Err(RpcServiceEndpointError::DuplicateMethod(
                descriptor.path.to_string(),
            )),
            Entry::Vacant(entry) => {
                entry.insert(RegisteredMethod {
                    descriptor,
                    handler,
                });
                Ok(())
            }
        }
    }

    /// Registers a single-request, single-response handler.
    fn register_unary<M, F, Fut>(&self, handler: F) -> Result<(), RpcServiceEndpointError>
    where
        M: RpcMethodUnary + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
        F: Fn(C, M::Input) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M::Output, crate::handler::BoxError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapped: ServerHandlerFn<C> = Arc::new(
            move |context: C, _ctx: ServerCallContext, mut request: RequestStream, sink: ResponseSink| {
                let handler = handler.clone();
                Box::pin(async move {
                    let Some(bytes) = request.next().await else {
                        return Err(Status::internal("request stream ended without a message"));
                    };
                    let input = M::decode_request(&bytes)
                        .map_err(|e| Status::internal(format!("request decode failed: {e}")))?;
                    let output = handler(context, input)
                        .await
                        .map_err(status_from_handler_error)?;
                    let encoded = M::encode_response(output)
                        .map_err(|e| Status::internal(format!("response encode failed: {e}")))?;
                    sink.send(encoded).await?;
                    Ok(())
                })
            },
        );
        self.register_handler(M::DESCRIPTOR, wrapped)
    }

    /// Registers a single-request handler that streams responses.
    fn register_server_streaming<M, F, Fut>(
        &self,
        handler: F,
    ) -> Result<(), RpcServiceEndpointError>
    where
        M: RpcMethodServerStreaming + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
        F: Fn(C, M::Input, StreamingResponder<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), crate::handler::BoxError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapped: ServerHandlerFn<C> = Arc::new(
            move |context: C, _ctx: ServerCallContext, mut request: RequestStream, sink: ResponseSink| {
                let handler = handler.clone();
                Box::pin(async move {
                    let Some(bytes) = request.next().await else {
                        return Err(Status::internal("request stream ended without a message"));
                    };
                    let input = M::decode_request(&bytes)
                        .map_err(|e| Status::internal(format!("request decode failed: {e}")))?;
                    handler(context, input, StreamingResponder::new(sink))
                        .await
                        .map_err(status_from_handler_error)
                })
            },
        );
        self.register_handler(M::DESCRIPTOR, wrapped)
    }

    /// Registers a streaming-request, single-response handler.
    fn register_client_streaming<M, F, Fut>(
        &self,
        handler: F,
    ) -> Result<(), RpcServiceEndpointError>
    where
        M: RpcMethodClientStreaming + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
        F: Fn(C, TypedRequestStream<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M::Output, crate::handler::BoxError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapped: ServerHandlerFn<C> = Arc::new(
            move |context: C, _ctx: ServerCallContext, request: RequestStream, sink: ResponseSink| {
                let handler = handler.clone();
                Box::pin(async move {
                    let output = handler(context, TypedRequestStream::new(request))
                        .await
                        .map_err(status_from_handler_error)?;
                    let encoded = M::encode_response(output)
                        .map_err(|e| Status::internal(format!("response encode failed: {e}")))?;
                    sink.send(encoded).await?;
                    Ok(())
                })
            },
        );
        self.register_handler(M::DESCRIPTOR, wrapped)
    }

    /// Registers a bidirectional streaming handler.
    fn register_duplex<M, F, Fut>(&self, handler: F) -> Result<(), RpcServiceEndpointError>
    where
        M: RpcMethodDuplex + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
        F: Fn(C, TypedRequestStream<M>, StreamingResponder<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), crate::handler::BoxError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapped: ServerHandlerFn<C> = Arc::new(
            move |context: C, _ctx: ServerCallContext, request: RequestStream, sink: ResponseSink| {
                let handler = handler.clone();
                Box::pin(async move {
                    handler(
                        context,
                        TypedRequestStream::new(request),
                        StreamingResponder::new(sink),
                    )
                    .await
                    .map_err(status_from_handler_error)
                })
            },
        );
        self.register_handler(M::DESCRIPTOR, wrapped)
    }

    /// Feeds one batch of connection bytes through the dispatcher and acts
    /// on the resulting events: accepting streams, feeding live handlers,
    /// and rejecting unknown methods.
    async fn read_bytes<E>(
        &self,
        conn: &ServerConnection,
        context: C,
        bytes: &[u8],
        on_emit: E,
    ) -> Result<(), RpcServiceEndpointError>
    where
        E: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        let result = conn.dispatcher.lock().unwrap().read_bytes(bytes);

        let events: Vec<StreamEvent> = conn.events.lock().unwrap().drain(..).collect();
        let emit: Arc<dyn Fn(Vec<u8>) + Send + Sync> = Arc::new(on_emit);

        for event in events {
            self.handle_event(conn, context.clone(), event, emit.clone());
        }

        // Connection-level framing corruption still surfaces, but only
        // after every decodable event was dispatched.
        result?;
        Ok(())
    }

    /// Routes one decoded event. Cheap and synchronous; handler work runs
    /// in spawned tasks.
    fn handle_event(
        &self,
        conn: &ServerConnection,
        context: C,
        event: StreamEvent,
        emit: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
    ) {
        match event {
            StreamEvent::Opened { stream_id, header } => {
                let registered = self
                    .get_handlers()
                    .lock()
                    .unwrap()
                    .get(&header.method_path)
                    .cloned();

                match registered {
                    Some(registered) => {
                        self.accept_stream(conn, context, stream_id, header, registered, emit);
                    }
                    None => {
                        // Rejected before any interceptor runs and without
                        // spawning a handler task.
                        tracing::debug!(stream_id, path = %header.method_path, "unknown method");
                        reject_stream(
                            conn,
                            stream_id,
                            emit,
                            &Status::unimplemented(format!(
                                "unknown method {}",
                                header.method_path
                            )),
                        );
                    }
                }
            }
            StreamEvent::Message {
                stream_id,
                envelope,
            } => {
                let mut active = conn.active.lock().unwrap();
                if let Some(stream) = active.get_mut(&stream_id) {
                    stream.requests_seen += 1;
                    if stream.single_request && stream.requests_seen > 1 {
                        let status = Status::internal(
                            "unexpected extra request message on single-request call",
                        );
                        stream.sink.cancel_stream(&status);
                        stream.cancel.cancel();
                        active.remove(&stream_id);
                        return;
                    }
                    if let Some(tx) = stream.msg_tx.as_ref() {
                        let _ = tx.unbounded_send(envelope.payload);
                    }
                }
            }
            StreamEvent::Trailers { stream_id, .. } => {
                // Client half-closed; the handler sees end-of-input. The
                // entry stays until its task finishes so window updates
                // keep routing.
                if let Some(stream) = conn.active.lock().unwrap().get_mut(&stream_id) {
                    stream.msg_tx.take();
                }
            }
            StreamEvent::Canceled { stream_id, status } => {
                if let Some(stream) = conn.active.lock().unwrap().remove(&stream_id) {
                    tracing::debug!(stream_id, %status, "client canceled call");
                    stream.cancel.cancel();
                }
            }
            StreamEvent::WindowUpdate { stream_id, .. } => {
                if let Some(stream) = conn.active.lock().unwrap().get(&stream_id) {
                    stream.sink.notify_window();
                }
            }
            StreamEvent::Error {
                stream_id: Some(stream_id),
                error,
            } => {
                if let Some(stream) = conn.active.lock().unwrap().remove(&stream_id) {
                    let status = Status::from(error);
                    tracing::warn!(stream_id, %status, "stream protocol error");
                    stream.sink.cancel_stream(&status);
                    stream.cancel.cancel();
                }
            }
            StreamEvent::Error {
                stream_id: None,
                error,
            } => {
                tracing::error!(%error, "connection-level protocol error");
            }
        }
    }

    /// Accepts a routed stream: opens the reply half, registers the
    /// in-flight state, and spawns the handler task wrapped in the
    /// interceptor chain.
    fn accept_stream(
        &self,
        conn: &ServerConnection,
        context: C,
        stream_id: u32,
        header: StreamHeader,
        registered: RegisteredMethod<C>,
        emit: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
    ) {
        let cancel = CancellationToken::new();
        let (msg_tx, msg_rx) = futures::channel::mpsc::unbounded();

        let encoder = {
            let emit = emit.clone();
            let emit_fn: BoxedEmit = Box::new(move |chunk: &[u8]| emit(chunk.to_vec()));
            conn.dispatcher.lock().unwrap().reply_stream(
                stream_id,
                &StreamHeader::reply(Metadata::new()),
                emit_fn,
            )
        };
        let encoder = match encoder {
            Ok(encoder) => encoder,
            Err(e) => {
                tracing::warn!(stream_id, error = %e, "failed to open reply stream");
                return;
            }
        };

        let sink = ResponseSink::new(encoder, cancel.clone());
        let request = RequestStream::new(stream_id, msg_rx, conn.dispatcher.clone(), emit);

        conn.active.lock().unwrap().insert(
            stream_id,
            ActiveStream {
                msg_tx: Some(msg_tx),
                sink: sink.clone(),
                cancel: cancel.clone(),
                single_request: !registered.descriptor.client_streaming,
                requests_seen: 0,
            },
        );

        let interceptors: Vec<Arc<dyn ServerInterceptor>> =
            self.get_interceptors().lock().unwrap().clone();
        let active = conn.active.clone();
        let server_ctx = ServerCallContext {
            path: header.method_path,
            metadata: header.metadata,
        };
        let handler = registered.handler;

        tokio::spawn(async move {
            let parts = Arc::new(Mutex::new(Some(request)));
            let terminal_sink = sink.clone();
            let terminal = move |ctx: ServerCallContext| -> ServerNextFuture {
                let taken = parts.lock().unwrap().take();
                let handler = handler.clone();
                let context = context.clone();
                let sink = terminal_sink.clone();
                Box::pin(async move {
                    match taken {
                        Some(request) => handler(context, ctx, request, sink).await,
                        None => Err(Status::internal("call dispatched twice")),
                    }
                })
            };

            let outcome = tokio::select! {
                res = ServerNext::new(&interceptors, &terminal).run(server_ctx) => res,
                _ = cancel.cancelled() => Err(Status::cancelled("call canceled")),
            };

            match outcome {
                Ok(()) => sink.complete(&Status::ok()),
                Err(status) => sink.complete(&status),
            }

            active.lock().unwrap().remove(&stream_id);
        });
    }
}

fn reject_stream(
    conn: &ServerConnection,
    stream_id: u32,
    emit: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
    status: &Status,
) {
    let emit_fn: BoxedEmit = Box::new(move |chunk: &[u8]| emit(chunk.to_vec()));
    let encoder = conn.dispatcher.lock().unwrap().reply_stream(
        stream_id,
        &StreamHeader::reply(Metadata::new()),
        emit_fn,
    );
    match encoder {
        Ok(mut encoder) => {
            if let Err(e) = encoder.close(&status.to_trailers()) {
                tracing::warn!(stream_id, error = %e, "failed to reject stream");
            }
        }
        Err(e) => {
            tracing::warn!(stream_id, error = %e, "failed to open reject reply");
        }
    }
}

impl<C> RpcServiceEndpointInterface<C> for RpcServiceEndpoint<C>
where
    C: Send + Sync + Clone + 'static,
{
    fn get_handlers(&self) -> Arc<Mutex<HashMap<String, RegisteredMethod<C>>>> {
        self.handlers.clone()
    }

    fn get_interceptors(&self) -> Arc<Mutex<Vec<Arc<dyn ServerInterceptor>>>> {
        self.interceptors.clone()
    }
}
