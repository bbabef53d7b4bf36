//! Note: this `RpcServer` is a reference transport and does not include
//! authentication or authorization mechanisms. It is best suited for
//! trusted, internal network communication or as a foundational example.
//! Any struct that drives an [`RpcServiceEndpoint`] can function as a
//! server; this implementation demonstrates one way to do so over
//! WebSockets using the Axum web framework.

use axum::{
    Router,
    extract::ConnectInfo,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    net::{TcpListener, ToSocketAddrs},
    sync::{Mutex, mpsc},
    time::timeout,
};
use weft::status::Status;
use weft::stream::SessionConfig;
use weft_rpc_service::constants::DEFAULT_SERVICE_MAX_CHUNK_SIZE;
use weft_rpc_service_endpoint::{
    RpcServiceEndpoint, RpcServiceEndpointInterface, ServerConnection,
};

/// The interval at which the server sends Ping messages to the client.
const HEARTBEAT_INTERVAL: u64 = 5;

/// The maximum time to wait for a message from the client (including Pong)
/// before considering the connection timed out.
const CLIENT_TIMEOUT: u64 = 15;

/// A type alias for the WebSocket sender part, wrapped for shared access.
/// This is the per-connection context handlers receive.
pub type WsSenderContext = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// An RPC server that listens for WebSocket connections and dispatches
/// streams to its endpoint's registered handlers.
pub struct RpcServer {
    endpoint: Arc<RpcServiceEndpoint<WsSenderContext>>,
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcServer {
    pub fn new() -> Self {
        RpcServer {
            endpoint: Arc::new(RpcServiceEndpoint::new()),
        }
    }

    /// Returns an `Arc` clone of the underlying RPC service endpoint, so
    /// handler registration is not tied to the server implementation.
    pub fn endpoint(&self) -> Arc<RpcServiceEndpoint<WsSenderContext>> {
        self.endpoint.clone()
    }

    /// Binds to an address and starts the RPC server.
    pub async fn serve<A: ToSocketAddrs>(self, addr: A) -> Result<SocketAddr, axum::BoxError> {
        let listener = TcpListener::bind(addr).await?;
        let server = Arc::new(self);
        server.serve_with_listener(listener).await
    }

    /// Starts the RPC server on a specific host and port.
    pub async fn serve_on(self, host: &str, port: u16) -> Result<SocketAddr, axum::BoxError> {
        let addr = format!("{host}:{port}");
        self.serve(addr).await
    }

    /// Starts the RPC server with a pre-bound `TcpListener`.
    ///
    /// Useful for binding to an ephemeral port (port 0) and retrieving the
    /// actual address before serving.
    pub async fn serve_with_listener(
        self: Arc<Self>,
        listener: TcpListener,
    ) -> Result<SocketAddr, axum::BoxError> {
        let address = listener.local_addr()?;
        let app = Router::new().route(
            "/ws",
            get({
                let server = self.clone();
                move |ws, conn| Self::ws_handler(ws, conn, server)
            }),
        );
        tracing::info!("Server running on {:?}", address);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(address)
    }

    async fn ws_handler(
        ws: WebSocketUpgrade,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        server: Arc<RpcServer>,
    ) -> impl IntoResponse {
        tracing::info!("Client connected: {}", addr);
        ws.on_upgrade(move |socket| server.handle_socket(socket, addr))
    }

    async fn handle_socket(self: Arc<Self>, socket: WebSocket, addr: SocketAddr) {
        let (sender, receiver) = socket.split();
        let context = Arc::new(Mutex::new(sender));
        let (tx, rx) = mpsc::unbounded_channel::<Message>();

        // Forward outbound messages to the WebSocket sender.
        tokio::spawn(Self::sender_task(context.clone(), rx));

        // Handle inbound messages and heartbeats.
        tokio::spawn(Self::receiver_task(
            self.endpoint.clone(),
            context,
            receiver,
            tx,
            addr,
        ));
    }

    /// Task responsible for sending outbound messages to the client.
    async fn sender_task(context: WsSenderContext, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(msg) = rx.recv().await {
            if context.lock().await.send(msg).await.is_err() {
                break; // Client has disconnected.
            }
        }
    }

    /// Task responsible for all inbound communication from one client:
    /// heartbeats, liveness timeout, and pumping binary messages through
    /// the endpoint. Each accepted stream runs independently; this loop
    /// never waits on a handler.
    async fn receiver_task(
        endpoint: Arc<RpcServiceEndpoint<WsSenderContext>>,
        context: WsSenderContext,
        mut receiver: SplitStream<WebSocket>,
        tx: mpsc::UnboundedSender<Message>,
        addr: SocketAddr,
    ) {
        let conn = ServerConnection::new(SessionConfig {
            max_chunk_size: DEFAULT_SERVICE_MAX_CHUNK_SIZE,
            ..SessionConfig::default()
        });
        let heartbeat_interval = Duration::from_secs(HEARTBEAT_INTERVAL);
        let client_timeout = Duration::from_secs(CLIENT_TIMEOUT);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(heartbeat_interval) => {
                    if tx.send(Message::Ping(vec![].into())).is_err() {
                        tracing::info!("Client {} disconnected (failed to send ping).", addr);
                        break;
                    }
                }

                result = timeout(client_timeout, receiver.next()) => {
                    match result {
                        Err(_) => {
                            tracing::warn!("Client {} timed out. Closing connection.", addr);
                            break;
                        },
                        Ok(Some(Ok(msg))) => {
                            match msg {
                                Message::Binary(bytes) => {
                                    let tx_clone = tx.clone();
                                    let on_emit = move |chunk: Vec<u8>| {
                                        let _ = tx_clone.send(Message::Binary(Bytes::from(chunk)));
                                    };
                                    if let Err(err) = endpoint.read_bytes(&conn, context.clone(), &bytes, on_emit).await {
                                        // Connection-level framing corruption tears the
                                        // whole transport down; per-stream errors were
                                        // already handled inside.
                                        tracing::error!("Error processing bytes from {}: {:?}", addr, err);
                                        break;
                                    }
                                }
                                Message::Pong(_) => {
                                    tracing::trace!("Received pong from {}", addr);
                                }
                                Message::Close(_) => {
                                    tracing::info!("Client {} initiated close.", addr);
                                    break;
                                }
                                _ => {} // Ignore Text and client Pings.
                            }
                        }
                        Ok(None) | Ok(Some(Err(_))) => {
                            tracing::info!("Client {} disconnected.", addr);
                            break;
                        }
                    }
                }
            }
        }

        // Loop exited: every live handler observes cancellation.
        conn.fail_all(&Status::unavailable("connection closed"));
        tracing::info!("Terminated connection for {}.", addr);
    }
}
