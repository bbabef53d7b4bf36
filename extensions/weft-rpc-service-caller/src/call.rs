use crate::call_options::CallOptions;
use crate::dynamic_channel::{DynamicChannelType, DynamicReceiver, DynamicSender, dynamic_channel};
use futures::channel::oneshot;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use weft::constants::ENVELOPE_HEADER_SIZE;
use weft::envelope::Envelope;
use weft::metadata::Metadata;
use weft::status::Status;
use weft::stream::{MuxDispatcher, StreamEncoder, StreamEvent, StreamHeader, StreamSendError};

/// The emit closure every call writes through; bytes land on the owning
/// transport's outbound queue.
pub type BoxedEmit = Box<dyn FnMut(&[u8]) + Send>;

type SharedEncoder = Arc<Mutex<Option<StreamEncoder<BoxedEmit>>>>;

struct CallState {
    messages: Option<DynamicSender>,
    status_tx: Option<oneshot::Sender<Status>>,
    initial_tx: Option<oneshot::Sender<Metadata>>,
}

/// State shared between the call's task, the transport read task (through
/// the event handler), and the watchdog.
struct CallShared {
    state: Mutex<CallState>,
    window_notify: Notify,
    cancel: CancellationToken,
}

impl CallShared {
    /// Produces the call's terminal status. Returns `true` only for the
    /// first resolution; every later attempt is a no-op, which is what
    /// makes the terminal status unique and idempotent.
    fn resolve(&self, status: Status) -> bool {
        let freshly_resolved = {
            let mut st = self.state.lock().unwrap();
            st.messages.take();
            st.initial_tx.take();
            match st.status_tx.take() {
                Some(tx) => {
                    let _ = tx.send(status);
                    true
                }
                None => false,
            }
        };
        if freshly_resolved {
            self.cancel.cancel();
            self.window_notify.notify_one();
        }
        freshly_resolved
    }
}

fn cancel_encoder(encoder: &SharedEncoder, status: &Status) {
    if let Some(enc) = encoder.lock().unwrap().as_mut() {
        let _ = enc.cancel(status);
    }
}

/// The sending half of an in-flight call.
///
/// `send` applies the stream's flow-control window: when the window is
/// exhausted it parks until the peer credits it, so a slow consumer
/// throttles the sender without unbounded buffering. `close` half-closes
/// the local side.
pub struct RpcRequestSink {
    encoder: SharedEncoder,
    shared: Arc<CallShared>,
    client_streaming: bool,
    sent: AtomicU32,
}

impl RpcRequestSink {
    /// Sends one request message, waiting for window credit as needed.
    pub async fn send(&self, message: Vec<u8>) -> Result<(), Status> {
        if !self.client_streaming && self.sent.fetch_add(1, Ordering::Relaxed) >= 1 {
            let status = Status::internal("single-request call attempted a second message");
            if self.shared.resolve(status.clone()) {
                cancel_encoder(&self.encoder, &status);
            }
            return Err(status);
        }

        let envelope = Envelope {
            compressed: false,
            payload: message,
        };

        loop {
            if self.shared.cancel.is_cancelled() {
                return Err(Status::cancelled("call canceled"));
            }

            // Created before the send attempt so a credit arriving in
            // between still stores its wakeup permit.
            let notified = self.shared.window_notify.notified();

            let result = match self.encoder.lock().unwrap().as_mut() {
                Some(enc) => enc.send_envelope(&envelope),
                None => return Err(Status::internal("call stream is not open")),
            };

            match result {
                Ok(_) => return Ok(()),
                Err(StreamSendError::WouldBlock { .. }) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = self.shared.cancel.cancelled() => {
                            return Err(Status::cancelled("call canceled"));
                        }
                    }
                }
                Err(StreamSendError::InvalidState(state)) => {
                    return Err(Status::internal(format!(
                        "send on stream in state {state:?}"
                    )));
                }
                Err(e) => return Err(Status::internal(e.to_string())),
            }
        }
    }

    /// Half-closes the sending side. Idempotent.
    pub fn close(&self) -> Result<(), Status> {
        let mut guard = self.encoder.lock().unwrap();
        match guard.as_mut() {
            Some(enc) => match enc.close(&Metadata::new()) {
                Ok(_) => Ok(()),
                Err(StreamSendError::InvalidState(_)) => Ok(()),
                Err(e) => Err(Status::internal(e.to_string())),
            },
            None => Ok(()),
        }
    }
}

/// The receiving half of an in-flight call: inbound messages, the reply's
/// initial metadata, and the terminal status.
pub struct RpcInboundCall {
    stream_id: u32,
    messages: DynamicReceiver,
    status_rx: Option<oneshot::Receiver<Status>>,
    status_cache: Option<Status>,
    initial_rx: Option<oneshot::Receiver<Metadata>>,
    dispatcher: Arc<Mutex<MuxDispatcher>>,
    emit: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
    encoder: SharedEncoder,
    shared: Arc<CallShared>,
}

impl RpcInboundCall {
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// The reply stream's initial metadata. Resolves `None` if the call
    /// fails before the peer opens its reply.
    pub async fn initial_metadata(&mut self) -> Option<Metadata> {
        match self.initial_rx.take() {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }

    /// The next inbound message, or `None` once the call reached its
    /// terminal state. Consuming a message credits the peer's send window.
    pub async fn next_message(&mut self) -> Option<Vec<u8>> {
        let payload = self.messages.recv().await?;

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

    /// The call's terminal status. Safe to call repeatedly; every call
    /// returns the identical value.
    pub async fn wait_status(&mut self) -> Status {
        if let Some(status) = &self.status_cache {
            return status.clone();
        }
        let status = match self.status_rx.take() {
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Status::unavailable("transport closed before the call completed")
            }),
            None => Status::unavailable("transport closed before the call completed"),
        };
        self.status_cache = Some(status.clone());
        status
    }

    /// Receives exactly one message then the terminal status, enforcing
    /// single-response cardinality.
    pub async fn recv_single(&mut self) -> Result<Vec<u8>, Status> {
        let Some(first) = self.next_message().await else {
            let status = self.wait_status().await;
            return Err(if status.is_ok() {
                Status::internal("call completed without a response message")
            } else {
                status
            });
        };

        if self.next_message().await.is_some() {
            let status =
                Status::internal("unexpected extra response message on single-response call");
            self.abort_with(status.clone());
            return Err(status);
        }

        let status = self.wait_status().await;
        if status.is_ok() { Ok(first) } else { Err(status) }
    }

    pub(crate) fn abort_with(&self, status: Status) {
        if self.shared.resolve(status.clone()) {
            cancel_encoder(&self.encoder, &status);
        }
    }
}

/// An in-flight call: one stream, one eventual terminal status.
pub struct RpcCall {
    pub sink: RpcRequestSink,
    pub inbound: RpcInboundCall,
}

/// Opens a stream on `dispatcher` and wires up the full call lifecycle:
/// event routing, cardinality enforcement, deadline, and cancellation.
///
/// The returned call is already live; its header is on the wire.
pub(crate) fn start_call_on(
    dispatcher: &Arc<Mutex<MuxDispatcher>>,
    emit: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
    path: &str,
    client_streaming: bool,
    server_streaming: bool,
    options: CallOptions,
) -> Result<RpcCall, Status> {
    let cancel = options.cancel.child_token();

    let (msg_tx, msg_rx) = dynamic_channel(DynamicChannelType::Unbounded);
    let (status_tx, status_rx) = oneshot::channel();
    let (initial_tx, initial_rx) = oneshot::channel();

    let shared = Arc::new(CallShared {
        state: Mutex::new(CallState {
            messages: Some(msg_tx),
            status_tx: Some(status_tx),
            initial_tx: Some(initial_tx),
        }),
        window_notify: Notify::new(),
        cancel: cancel.clone(),
    });

    let encoder_slot: SharedEncoder = Arc::new(Mutex::new(None));

    let handler = {
        let shared = shared.clone();
        let encoder_slot = encoder_slot.clone();
        let single_response = !server_streaming;
        let mut responses_seen: u32 = 0;

        move |event: StreamEvent| match event {
            StreamEvent::Opened { header, .. } => {
                let mut st = shared.state.lock().unwrap();
                if let Some(tx) = st.initial_tx.take() {
                    let _ = tx.send(header.metadata);
                }
            }
            StreamEvent::Message { envelope, .. } => {
                responses_seen += 1;
                if single_response && responses_seen > 1 {
                    let status = Status::internal(
                        "unexpected extra response message on single-response call",
                    );
                    if shared.resolve(status.clone()) {
                        cancel_encoder(&encoder_slot, &status);
                    }
                    return;
                }
                let mut st = shared.state.lock().unwrap();
                if let Some(tx) = st.messages.as_mut() {
                    tx.send_and_ignore(envelope.payload);
                }
            }
            StreamEvent::Trailers { trailers, .. } => {
                let status = Status::from_trailers(&trailers)
                    .unwrap_or_else(|| Status::internal("stream ended without a status"));
                shared.resolve(status);
            }
            StreamEvent::Canceled { status, .. } => {
                shared.resolve(status);
            }
            StreamEvent::WindowUpdate { .. } => {
                shared.window_notify.notify_one();
            }
            StreamEvent::Error { error, .. } => {
                let status = Status::from(error);
                if shared.resolve(status.clone()) {
                    cancel_encoder(&encoder_slot, &status);
                }
            }
        }
    };

    let header = StreamHeader::new(path, options.metadata);
    let emit_bytes: BoxedEmit = Box::new({
        let emit = emit.clone();
        move |chunk: &[u8]| emit(chunk.to_vec())
    });

    let encoder = dispatcher
        .lock()
        .unwrap()
        .open_stream(&header, emit_bytes, handler)
        .map_err(|e| Status::internal(format!("failed to open call stream: {e}")))?;
    let stream_id = encoder.stream_id();
    *encoder_slot.lock().unwrap() = Some(encoder);

    // One watchdog per call covers both cancellation sources: the caller's
    // token and the deadline timer. Terminal resolution cancels the token,
    // so this task never outlives the call.
    tokio::spawn({
        let shared = shared.clone();
        let encoder_slot = encoder_slot.clone();
        let cancel = cancel.clone();
        let deadline = options.deadline;
        async move {
            let expired = async {
                match deadline {
                    Some(d) => tokio::time::sleep(d).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    let status = Status::cancelled("call canceled");
                    if shared.resolve(status.clone()) {
                        cancel_encoder(&encoder_slot, &status);
                    }
                }
                _ = expired => {
                    let status = Status::deadline_exceeded("call deadline elapsed");
                    if shared.resolve(status.clone()) {
                        cancel_encoder(&encoder_slot, &status);
                    }
                }
            }
        }
    });

    Ok(RpcCall {
        sink: RpcRequestSink {
            encoder: encoder_slot.clone(),
            shared: shared.clone(),
            client_streaming,
            sent: AtomicU32::new(0),
        },
        inbound: RpcInboundCall {
            stream_id,
            messages: msg_rx,
            status_rx: Some(status_rx),
            status_cache: None,
            initial_rx: Some(initial_rx),
            dispatcher: dispatcher.clone(),
            emit,
            encoder: encoder_slot,
            shared,
        },
    })
}
