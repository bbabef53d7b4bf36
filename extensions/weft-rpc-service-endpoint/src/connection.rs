use crate::handler::ResponseSink;
use futures::channel::mpsc::UnboundedSender;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use weft::status::Status;
use weft::stream::{MuxDispatcher, SessionConfig, SessionRole, StreamEvent};

/// One accepted stream mid-flight: the channel feeding its handler, the
/// reply sink, and the cancellation token its task runs under.
pub(crate) struct ActiveStream {
    pub(crate) msg_tx: Option<UnboundedSender<Vec<u8>>>,
    pub(crate) sink: ResponseSink,
    pub(crate) cancel: CancellationToken,
    /// True when the method takes exactly one request message.
    pub(crate) single_request: bool,
    pub(crate) requests_seen: u32,
}

/// Per-connection state a transport owns: the connection's dispatcher and
/// the set of streams currently being handled.
///
/// The dispatcher routes nothing itself on the server side; its catch-all
/// parks every event in a queue that
/// [`RpcServiceEndpointInterface::read_bytes`](crate::RpcServiceEndpointInterface)
/// drains after each batch of bytes. That keeps event routing outside the
/// dispatcher lock, so handler tasks can credit windows and send replies
/// concurrently with the read loop.
pub struct ServerConnection {
    pub(crate) dispatcher: Arc<Mutex<MuxDispatcher>>,
    pub(crate) events: Arc<Mutex<VecDeque<StreamEvent>>>,
    pub(crate) active: Arc<Mutex<HashMap<u32, ActiveStream>>>,
}

impl ServerConnection {
    pub fn new(config: SessionConfig) -> Self {
        let dispatcher = Arc::new(Mutex::new(MuxDispatcher::new(SessionRole::Server, config)));
        let events: Arc<Mutex<VecDeque<StreamEvent>>> = Arc::new(Mutex::new(VecDeque::new()));

        {
            let queue = events.clone();
            dispatcher
                .lock()
                .unwrap()
                .set_catch_all_handler(move |event| {
                    queue.lock().unwrap().push_back(event);
                });
        }

        Self {
            dispatcher,
            events,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of streams with a live handler.
    pub fn active_streams(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    /// Tears the connection down: every live handler observes
    /// cancellation and the given status.
    pub fn fail_all(&self, status: &Status) {
        let drained: Vec<ActiveStream> = {
            let mut active = self.active.lock().unwrap();
            active.drain().map(|(_, stream)| stream).collect()
        };
        for stream in drained {
            stream.cancel.cancel();
            drop(stream.msg_tx);
        }
        tracing::debug!(%status, "server connection closed");
    }
}

impl Default for ServerConnection {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
