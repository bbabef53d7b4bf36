use crate::interceptor::ServerCallContext;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use weft::constants::ENVELOPE_HEADER_SIZE;
use weft::envelope::Envelope;
use weft::status::Status;
use weft::stream::{MuxDispatcher, StreamEncoder, StreamSendError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type BoxedEmit = Box<dyn FnMut(&[u8]) + Send>;

/// The erased form every registered handler is stored as.
pub type ServerHandlerFn<C> = Arc<
    dyn Fn(
            C,
            ServerCallContext,
            RequestStream,
            ResponseSink,
        ) -> Pin<Box<dyn Future<Output = Result<(), Status>> + Send>>
        + Send
        + Sync,
>;

/// Maps a handler's error into the call's terminal status: a `Status`
/// passes through untouched, anything else becomes `Internal` carrying the
/// error's description. The runtime adds nothing else; keeping internal
/// detail out of the message is the handler's responsibility.
pub fn status_from_handler_error(e: BoxError) -> Status {
    match e.downcast::<Status>() {
        Ok(status) => *status,
        Err(other) => Status::internal(other.to_string()),
    }
}

/// Inbound request messages for one accepted stream.
///
/// Consuming a message credits the client's send window, which is what
/// lets a paused sender resume; a handler that stops reading applies
/// backpressure all the way to the client.
pub struct RequestStream {
    stream_id: u32,
    rx: futures::channel::mpsc::UnboundedReceiver<Vec<u8>>,
    dispatcher: Arc<Mutex<MuxDispatcher>>,
    emit: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
}

impl RequestStream {
    pub(crate) fn new(
        stream_id: u32,
        rx: futures::channel::mpsc::UnboundedReceiver<Vec<u8>>,
        dispatcher: Arc<Mutex<MuxDispatcher>>,
        emit: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
    ) -> Self {
        Self {
            stream_id,
            rx,
            dispatcher,
            emit,
        }
    }

    /// The next request message, or `None` once the client half-closed.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        use futures::StreamExt;
        let payload = self.rx.next().await?;

        let wire_size = (payload.len() + ENVELOPE_HEADER_SIZE) as u32;
        {
            let mut dispatcher = self.dispatcher.lock().unwrap();
            let emit = self.emit.clone();
            dispatcher.credit_received(self.stream_id, wire_size, &mut move |bytes: &[u8]| {
                emit(bytes.to_vec())
            });
        }

        Some(payload)
    }
}

struct SinkInner {
    encoder: Mutex<Option<StreamEncoder<BoxedEmit>>>,
    window_notify: Notify,
    cancel: CancellationToken,
}

/// The reply half of one accepted stream. Cheap to clone; the dispatch
/// machinery keeps one to complete the call after the handler returns.
///
/// `send` applies reply-direction flow control the same way the client
/// sink does: a slow client throttles the handler.
#[derive(Clone)]
pub struct ResponseSink {
    inner: Arc<SinkInner>,
}

impl ResponseSink {
    pub(crate) fn new(encoder: StreamEncoder<BoxedEmit>, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                encoder: Mutex::new(Some(encoder)),
                window_notify: Notify::new(),
                cancel,
            }),
        }
    }

    pub(crate) fn notify_window(&self) {
        self.inner.window_notify.notify_one();
    }

    /// Sends one response message, waiting for window credit as needed.
    pub async fn send(&self, message: Vec<u8>) -> Result<(), Status> {
        let envelope = Envelope {
            compressed: false,
            payload: message,
        };

        loop {
            if self.inner.cancel.is_cancelled() {
                return Err(Status::cancelled("call canceled"));
            }

            let notified = self.inner.window_notify.notified();

            let result = match self.inner.encoder.lock().unwrap().as_mut() {
                Some(enc) => enc.send_envelope(&envelope),
                None => return Err(Status::internal("reply stream is not open")),
            };

            match result {
                Ok(_) => return Ok(()),
                Err(StreamSendError::WouldBlock { .. }) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = self.inner.cancel.cancelled() => {
                            return Err(Status::cancelled("call canceled"));
                        }
                    }
                }
                Err(StreamSendError::InvalidState(state)) => {
                    return Err(Status::internal(format!(
                        "send on reply stream in state {state:?}"
                    )));
                }
                Err(e) => return Err(Status::internal(e.to_string())),
            }
        }
    }

    /// Completes the call: half-closes the reply with `status` in the
    /// trailers. Idempotent; the first completion wins.
    pub fn complete(&self, status: &Status) {
        if let Some(enc) = self.inner.encoder.lock().unwrap().as_mut() {
            match enc.close(&status.to_trailers()) {
                Ok(_) => {}
                // Already half-closed or canceled; the first completion won.
                Err(StreamSendError::InvalidState(_)) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "reply close failed");
                }
            }
        }
    }

    /// Resets the stream out of band.
    pub(crate) fn cancel_stream(&self, status: &Status) {
        if let Some(enc) = self.inner.encoder.lock().unwrap().as_mut() {
            let _ = enc.cancel(status);
        }
        self.inner.cancel.cancel();
    }
}

/// Typed view over a [`RequestStream`].
pub struct TypedRequestStream<M: weft_rpc_service::RpcMethod> {
    inner: RequestStream,
    _marker: PhantomData<fn() -> M>,
}

impl<M: weft_rpc_service::RpcMethod> TypedRequestStream<M> {
    pub(crate) fn new(inner: RequestStream) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub async fn next(&mut self) -> Option<Result<M::Input, Status>> {
        let bytes = self.inner.next().await?;
        Some(
            M::decode_request(&bytes)
                .map_err(|e| Status::internal(format!("request decode failed: {e}"))),
        )
    }
}

/// Typed view over a [`ResponseSink`] for streaming-response handlers.
pub struct StreamingResponder<M: weft_rpc_service::RpcMethod> {
    sink: ResponseSink,
    _marker: PhantomData<fn() -> M>,
}

impl<M: weft_rpc_service::RpcMethod> StreamingResponder<M> {
    pub(crate) fn new(sink: ResponseSink) -> Self {
        Self {
            sink,
            _marker: PhantomData,
        }
    }

    pub async fn send(&self, output: M::Output) -> Result<(), Status> {
        let bytes = M::encode_response(output)
            .map_err(|e| Status::internal(format!("response encode failed: {e}")))?;
        self.sink.send(bytes).await
    }
}
