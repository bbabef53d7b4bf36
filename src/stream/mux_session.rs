use crate::constants::{
    DEFAULT_INITIAL_WINDOW_SIZE, DEFAULT_MAX_MESSAGE_SIZE, WINDOW_UPDATE_PAYLOAD_SIZE,
};
use crate::frame::{Frame, FrameCodec, FrameEncodeError, FrameKind, FrameMuxStreamDecoder};
use crate::stream::{
    FlowWindow, StreamDecodeError, StreamDecoder, StreamEncoder, StreamEvent, StreamHeader,
};
use crate::utils::now;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Which side of the connection this session sits on. The role fixes the
/// stream-id parity so both peers can open streams without coordination:
/// client-initiated streams are odd, server-initiated even.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Client,
    Server,
}

/// Per-connection tunables, fixed at session construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_chunk_size: usize,
    pub max_message_size: usize,
    pub initial_window_size: u32,
    /// Whether the compression negotiation for this connection admits
    /// compressed envelopes in the receive direction.
    pub accept_compressed: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 64 * 1024,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            accept_compressed: false,
        }
    }
}

struct InboundStream {
    decoder: StreamDecoder,
    /// Credit the peer has left for sending to us. Debited as messages are
    /// delivered, restored through [`MuxSession::credit_received`].
    recv_window: FlowWindow,
}

/// Low-level stream multiplexing engine for one connection.
///
/// Allocates stream ids, tracks per-stream inbound decode state and
/// receive windows, applies peer window credits to outbound streams, and
/// turns raw connection bytes into [`StreamEvent`]s. It performs no
/// routing and owns no IO; a single connection task drives it.
pub struct MuxSession {
    role: SessionRole,
    next_stream_id: u32,
    config: SessionConfig,
    frame_decoder: FrameMuxStreamDecoder,
    inbound: HashMap<u32, InboundStream>,
    /// Send windows of streams this side opened or replied on, credited
    /// when the peer's `WindowUpdate` frames arrive.
    outbound_windows: HashMap<u32, Weak<FlowWindow>>,
}

impl MuxSession {
    pub fn new(role: SessionRole, config: SessionConfig) -> Self {
        Self {
            role,
            next_stream_id: match role {
                SessionRole::Client => 1,
                SessionRole::Server => 2,
            },
            config,
            frame_decoder: FrameMuxStreamDecoder::new(),
            inbound: HashMap::new(),
            outbound_windows: HashMap::new(),
        }
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn allocate_stream_id(&mut self) -> u32 {
        let id = self.next_stream_id;
        self.next_stream_id = self.next_stream_id.wrapping_add(2);
        id
    }

    fn track_outbound<F>(&mut self, encoder: &StreamEncoder<F>)
    where
        F: FnMut(&[u8]),
    {
        self.outbound_windows
            .insert(encoder.stream_id(), Arc::downgrade(&encoder.send_window()));
    }

    /// Opens a new outbound stream carrying `header`. The returned encoder
    /// owns the sending half; its send window is credited by this session
    /// as the peer acknowledges consumption.
    pub fn open_stream<F>(
        &mut self,
        header: &StreamHeader,
        on_emit: F,
    ) -> Result<StreamEncoder<F>, FrameEncodeError>
    where
        F: FnMut(&[u8]),
    {
        let stream_id = self.allocate_stream_id();
        let window = Arc::new(FlowWindow::new(self.config.initial_window_size));
        let encoder = StreamEncoder::new(
            stream_id,
            self.config.max_chunk_size,
            header,
            window,
            on_emit,
        )?;
        self.track_outbound(&encoder);
        Ok(encoder)
    }

    /// Opens the reply half of a peer-initiated stream, reusing its id.
    pub fn reply_stream<F>(
        &mut self,
        stream_id: u32,
        header: &StreamHeader,
        on_emit: F,
    ) -> Result<StreamEncoder<F>, FrameEncodeError>
    where
        F: FnMut(&[u8]),
    {
        let window = Arc::new(FlowWindow::new(self.config.initial_window_size));
        let encoder = StreamEncoder::new(
            stream_id,
            self.config.max_chunk_size,
            header,
            window,
            on_emit,
        )?;
        self.track_outbound(&encoder);
        Ok(encoder)
    }

    /// Reports that the application consumed `bytes` of stream
    /// `stream_id`'s messages, restoring local receive credit and telling
    /// the peer via a `WindowUpdate` frame.
    pub fn credit_received<F>(&mut self, stream_id: u32, bytes: u32, on_emit: &mut F)
    where
        F: FnMut(&[u8]),
    {
        let Some(stream) = self.inbound.get_mut(&stream_id) else {
            // Stream already finished; nothing left to credit.
            return;
        };

        if stream.recv_window.credit(bytes).is_err() {
            tracing::warn!(stream_id, bytes, "receive window credit overflow ignored");
            return;
        }

        let frame = Frame {
            stream_id,
            seq_id: 0,
            kind: FrameKind::WindowUpdate,
            timestamp_micros: now(),
            payload: bytes.to_le_bytes().to_vec(),
        };
        on_emit(&FrameCodec::encode(&frame));
    }

    /// Number of inbound streams with live decode state.
    pub fn inbound_streams(&self) -> usize {
        self.inbound.len()
    }

    /// Receives connection bytes, decodes them, and invokes `on_event` for
    /// each resulting stream event.
    ///
    /// Per-stream protocol violations surface as `StreamEvent::Error` for
    /// that stream and processing continues. Connection-level framing
    /// corruption also returns `Err`, signalling the owner to tear the
    /// transport down.
    pub fn read_bytes<H>(
        &mut self,
        bytes: &[u8],
        mut on_event: H,
    ) -> Result<(), StreamDecodeError>
    where
        H: FnMut(StreamEvent),
    {
        let mut fatal: Option<StreamDecodeError> = None;

        for frame_result in self.frame_decoder.read_bytes(bytes) {
            let frame = match frame_result {
                Ok(frame) => frame,
                Err(e) => {
                    let error = StreamDecodeError::Frame(e);
                    on_event(StreamEvent::Error {
                        stream_id: None,
                        error: error.clone(),
                    });
                    fatal.get_or_insert(error);
                    continue;
                }
            };

            let stream_id = frame.inner.stream_id;

            match frame.inner.kind {
                FrameKind::WindowUpdate => {
                    let credited = match frame.inner.payload.get(..WINDOW_UPDATE_PAYLOAD_SIZE) {
                        Some(slice) => u32::from_le_bytes(slice.try_into().unwrap()),
                        None => {
                            on_event(StreamEvent::Error {
                                stream_id: Some(stream_id),
                                error: StreamDecodeError::Frame(
                                    crate::frame::FrameDecodeError::CorruptFrame,
                                ),
                            });
                            continue;
                        }
                    };

                    match self
                        .outbound_windows
                        .get(&stream_id)
                        .and_then(Weak::upgrade)
                    {
                        Some(window) => {
                            if window.credit(credited).is_err() {
                                tracing::warn!(stream_id, credited, "peer overflowed send window");
                                on_event(StreamEvent::Error {
                                    stream_id: Some(stream_id),
                                    error: StreamDecodeError::FlowViolation,
                                });
                                continue;
                            }
                        }
                        None => {
                            // Encoder already dropped; the stream is done
                            // sending and its entry can be reclaimed.
                            self.outbound_windows.remove(&stream_id);
                        }
                    }

                    on_event(StreamEvent::WindowUpdate {
                        stream_id,
                        credited,
                    });
                }
                FrameKind::Cancel => {
                    // Cancel may target a stream we never saw inbound bytes
                    // for (the peer resetting our outbound work), so the
                    // event is synthesized even without decode state.
                    let events = match self.inbound.remove(&stream_id) {
                        Some(mut stream) => stream.decoder.decode_frame(&frame),
                        None => {
                            let mut decoder = StreamDecoder::new(
                                stream_id,
                                self.config.max_message_size,
                                self.config.accept_compressed,
                            );
                            decoder.decode_frame(&frame)
                        }
                    };
                    self.outbound_windows.remove(&stream_id);
                    match events {
                        Ok(events) => events.into_iter().for_each(&mut on_event),
                        Err(error) => on_event(StreamEvent::Error {
                            stream_id: Some(stream_id),
                            error,
                        }),
                    }
                }
                FrameKind::Open | FrameKind::Data | FrameKind::End => {
                    let config = &self.config;
                    let stream = self.inbound.entry(stream_id).or_insert_with(|| {
                        InboundStream {
                            decoder: StreamDecoder::new(
                                stream_id,
                                config.max_message_size,
                                config.accept_compressed,
                            ),
                            recv_window: FlowWindow::new(config.initial_window_size),
                        }
                    });

                    let mut finished = false;
                    match stream.decoder.decode_frame(&frame) {
                        Ok(events) => {
                            for event in events {
                                if let StreamEvent::Message { envelope, .. } = &event {
                                    if stream
                                        .recv_window
                                        .reserve(envelope.wire_size() as u32)
                                        .is_err()
                                    {
                                        tracing::warn!(
                                            stream_id,
                                            "peer overran receive window"
                                        );
                                        on_event(StreamEvent::Error {
                                            stream_id: Some(stream_id),
                                            error: StreamDecodeError::FlowViolation,
                                        });
                                        finished = true;
                                        break;
                                    }
                                }
                                if matches!(event, StreamEvent::Trailers { .. }) {
                                    finished = true;
                                }
                                on_event(event);
                            }
                        }
                        Err(error) => {
                            on_event(StreamEvent::Error {
                                stream_id: Some(stream_id),
                                error,
                            });
                            finished = true;
                        }
                    }

                    if finished {
                        self.inbound.remove(&stream_id);
                    }
                }
            }
        }

        match fatal {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
