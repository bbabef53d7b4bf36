use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, unbounded_channel};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, protocol::Message as WsMessage},
};
use weft::status::Status;
use weft::stream::{MuxDispatcher, SessionConfig, SessionRole};
use weft_rpc_service::constants::DEFAULT_SERVICE_MAX_CHUNK_SIZE;
use weft_rpc_service_caller::{RpcServiceCallerInterface, RpcTransportState};

type StateChangeHandler = Box<dyn Fn(RpcTransportState) + Send + Sync>;

/// State shared between the client handle and its background tasks, so a
/// disconnect observed anywhere resolves every in-flight call exactly
/// once.
struct ClientShared {
    dispatcher: Arc<Mutex<MuxDispatcher>>,
    is_connected: AtomicBool,
    state_handler: Mutex<Option<StateChangeHandler>>,
}

impl ClientShared {
    fn mark_disconnected(&self) {
        if self.is_connected.swap(false, Ordering::AcqRel) {
            self.dispatcher
                .lock()
                .unwrap()
                .fail_all(&Status::unavailable("transport disconnected"));
            if let Some(handler) = self.state_handler.lock().unwrap().as_ref() {
                handler(RpcTransportState::Disconnected);
            }
        }
    }
}

fn ws_error_to_io(e: WsError) -> io::Error {
    match e {
        WsError::Io(io_err) => io_err,
        other => io::Error::other(other),
    }
}

/// A WebSocket RPC client over one connection.
///
/// Background tasks pump the socket both ways; every in-flight call is
/// multiplexed over the shared dispatcher. Dropping the client aborts the
/// tasks and fails open calls with `Unavailable`.
pub struct RpcClient {
    shared: Arc<ClientShared>,
    tx: mpsc::UnboundedSender<WsMessage>,
    recv_task: JoinHandle<()>,
    send_task: JoinHandle<()>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Connects to `ws://host:port/ws`.
    pub async fn new(host: &str, port: u16) -> io::Result<RpcClient> {
        let url = format!("ws://{host}:{port}/ws");
        Self::from_url(&url).await
    }

    /// Connects to a full WebSocket URL.
    pub async fn from_url(url: &str) -> io::Result<RpcClient> {
        let (ws_stream, _) = connect_async(url).await.map_err(ws_error_to_io)?;
        let (mut sender, mut receiver) = ws_stream.split();

        let (tx, mut rx) = unbounded_channel::<WsMessage>();

        let dispatcher = Arc::new(Mutex::new(MuxDispatcher::new(
            SessionRole::Client,
            SessionConfig {
                max_chunk_size: DEFAULT_SERVICE_MAX_CHUNK_SIZE,
                ..SessionConfig::default()
            },
        )));

        let shared = Arc::new(ClientShared {
            dispatcher,
            is_connected: AtomicBool::new(true),
            state_handler: Mutex::new(None),
        });

        // Send loop: drain the outbound queue into the socket.
        let send_task = tokio::spawn({
            let shared = shared.clone();
            async move {
                while let Some(msg) = rx.recv().await {
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                shared.mark_disconnected();
            }
        });

        // Receive loop: feed inbound bytes through the dispatcher, which
        // routes events to each call's handler.
        let recv_task = tokio::spawn({
            let shared = shared.clone();
            async move {
                while let Some(msg) = receiver.next().await {
                    match msg {
                        Ok(WsMessage::Binary(bytes)) => {
                            let result = shared.dispatcher.lock().unwrap().read_bytes(&bytes);
                            if let Err(e) = result {
                                // Connection-level framing corruption; the
                                // transport is no longer trustworthy.
                                tracing::error!(error = %e, "tearing down corrupt connection");
                                break;
                            }
                        }
                        Ok(WsMessage::Close(_)) | Err(_) => break,
                        Ok(_) => {} // Pings and pongs are handled by tungstenite.
                    }
                }
                shared.mark_disconnected();
            }
        });

        Ok(RpcClient {
            shared,
            tx,
            recv_task,
            send_task,
        })
    }

    /// Registers a handler observing connection state changes. If the
    /// client is currently connected the handler immediately observes
    /// `Connected`.
    pub fn set_state_change_handler(
        &self,
        handler: impl Fn(RpcTransportState) + Send + Sync + 'static,
    ) {
        if self.shared.is_connected.load(Ordering::Acquire) {
            handler(RpcTransportState::Connected);
        }
        *self.shared.state_handler.lock().unwrap() = Some(Box::new(handler));
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.recv_task.abort();
        self.send_task.abort();
        self.shared.mark_disconnected();
    }
}

impl RpcServiceCallerInterface for RpcClient {
    fn get_dispatcher(&self) -> Arc<Mutex<MuxDispatcher>> {
        self.shared.dispatcher.clone()
    }

    fn get_emit_fn(&self) -> Arc<dyn Fn(Vec<u8>) + Send + Sync> {
        let tx = self.tx.clone();
        Arc::new(move |chunk: Vec<u8>| {
            let _ = tx.send(WsMessage::Binary(Bytes::from(chunk)));
        })
    }

    fn is_connected(&self) -> bool {
        self.shared.is_connected.load(Ordering::Acquire)
    }
}
