use crate::frame::FrameEncodeError;
use crate::status::Status;
use crate::stream::{
    MuxSession, SessionConfig, SessionRole, StreamDecodeError, StreamEncoder, StreamEvent,
    StreamHeader,
    stream_trait::{StreamEmit, StreamEventHandler},
};
use std::collections::HashMap;

/// Wrapper over [`MuxSession`] that routes events to per-stream handlers.
///
/// A handler is registered when a stream is opened (or explicitly, for
/// accepted streams) and invoked for every event on that stream id. Events
/// for ids with no handler fall through to an optional catch-all, which is
/// how a server observes newly opened streams. Handlers are dropped once
/// their stream reaches a terminal event.
///
/// Both the client and the server transports instantiate one dispatcher
/// per connection.
pub struct MuxDispatcher {
    session: MuxSession,
    stream_handlers: HashMap<u32, Box<dyn FnMut(StreamEvent) + Send>>,
    catch_all_handler: Option<Box<dyn FnMut(StreamEvent) + Send>>,
}

impl MuxDispatcher {
    pub fn new(role: SessionRole, config: SessionConfig) -> Self {
        Self {
            session: MuxSession::new(role, config),
            stream_handlers: HashMap::new(),
            catch_all_handler: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        self.session.config()
    }

    /// Opens an outbound stream and registers `on_event` for its inbound
    /// events. Registration happens before any byte reaches the wire, so
    /// no reply can race the handler.
    pub fn open_stream<E, H>(
        &mut self,
        header: &StreamHeader,
        on_emit: E,
        on_event: H,
    ) -> Result<StreamEncoder<E>, FrameEncodeError>
    where
        E: StreamEmit,
        H: StreamEventHandler + 'static,
    {
        let encoder = self.session.open_stream(header, on_emit)?;
        self.stream_handlers
            .insert(encoder.stream_id(), Box::new(on_event));
        Ok(encoder)
    }

    /// Opens the reply half of an accepted stream.
    pub fn reply_stream<E>(
        &mut self,
        stream_id: u32,
        header: &StreamHeader,
        on_emit: E,
    ) -> Result<StreamEncoder<E>, FrameEncodeError>
    where
        E: StreamEmit,
    {
        self.session.reply_stream(stream_id, header, on_emit)
    }

    /// Registers a handler for an accepted (peer-initiated) stream.
    pub fn register_stream_handler<H>(&mut self, stream_id: u32, on_event: H)
    where
        H: StreamEventHandler + 'static,
    {
        self.stream_handlers.insert(stream_id, Box::new(on_event));
    }

    /// Invoked for events on streams with no registered handler; a server
    /// uses this to observe `Opened` events for dispatch.
    pub fn set_catch_all_handler<H>(&mut self, handler: H)
    where
        H: StreamEventHandler + 'static,
    {
        self.catch_all_handler = Some(Box::new(handler));
    }

    /// Restores receive credit for a consumed message; see
    /// [`MuxSession::credit_received`].
    pub fn credit_received<F>(&mut self, stream_id: u32, bytes: u32, on_emit: &mut F)
    where
        F: FnMut(&[u8]),
    {
        self.session.credit_received(stream_id, bytes, on_emit);
    }

    pub fn active_streams(&self) -> usize {
        self.stream_handlers.len()
    }

    /// Feeds connection bytes through the session and routes the resulting
    /// events. Returns `Err` only for connection-level framing corruption.
    pub fn read_bytes(&mut self, bytes: &[u8]) -> Result<(), StreamDecodeError> {
        let Self {
            session,
            stream_handlers,
            catch_all_handler,
        } = self;

        session.read_bytes(bytes, |event| {
            let terminal = matches!(
                event,
                StreamEvent::Trailers { .. }
                    | StreamEvent::Canceled { .. }
                    | StreamEvent::Error {
                        stream_id: Some(_),
                        ..
                    }
            );
            let id = event.stream_id();

            match id.and_then(|id| stream_handlers.get_mut(&id)) {
                Some(handler) => {
                    handler(event);
                    if terminal {
                        if let Some(id) = id {
                            stream_handlers.remove(&id);
                        }
                    }
                }
                None => {
                    if let Some(catch_all) = catch_all_handler.as_mut() {
                        catch_all(event);
                    }
                }
            }
        })
    }

    /// Fails every registered stream with `status`. Used on transport
    /// teardown so in-flight calls resolve promptly instead of hanging.
    pub fn fail_all(&mut self, status: &Status) {
        for (stream_id, mut handler) in self.stream_handlers.drain() {
            handler(StreamEvent::Canceled {
                stream_id,
                status: status.clone(),
            });
        }
    }
}
