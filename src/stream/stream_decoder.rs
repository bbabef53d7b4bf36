use crate::envelope::EnvelopeDecoder;
use crate::frame::{DecodedFrame, FrameKind};
use crate::metadata::Metadata;
use crate::status::Status;
use crate::stream::{StreamDecodeError, StreamEvent, StreamHeader};

enum StreamDecoderState {
    AwaitHeader,
    AwaitEnvelopes,
    Done,
}

/// The inbound half of one stream: parses the header block, then
/// envelopes, then the trailing metadata, emitting [`StreamEvent`]s.
///
/// Frames arrive already reassembled in order; this decoder only has to
/// cope with payload boundaries falling anywhere relative to header and
/// envelope boundaries.
pub struct StreamDecoder {
    stream_id: u32,
    state: StreamDecoderState,
    buffer: Vec<u8>,
    envelope_decoder: EnvelopeDecoder,
}

impl StreamDecoder {
    pub fn new(stream_id: u32, max_message_size: usize, accept_compressed: bool) -> Self {
        Self {
            stream_id,
            state: StreamDecoderState::AwaitHeader,
            buffer: Vec::new(),
            envelope_decoder: EnvelopeDecoder::new(max_message_size, accept_compressed),
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    fn decode_trailer_metadata(payload: &[u8]) -> Result<Metadata, StreamDecodeError> {
        if payload.is_empty() {
            Ok(Metadata::new())
        } else {
            Ok(Metadata::decode(payload)?)
        }
    }

    pub fn decode_frame(
        &mut self,
        frame: &DecodedFrame,
    ) -> Result<Vec<StreamEvent>, StreamDecodeError> {
        let mut events = Vec::new();

        match frame.inner.kind {
            FrameKind::End => {
                // A half-close that strands a partial header or envelope is
                // a protocol violation, not a clean end.
                if !self.buffer.is_empty() || !self.envelope_decoder.is_idle() {
                    return Err(StreamDecodeError::TruncatedMessage);
                }
                let trailers = Self::decode_trailer_metadata(&frame.inner.payload)?;
                self.state = StreamDecoderState::Done;
                events.push(StreamEvent::Trailers {
                    stream_id: self.stream_id,
                    trailers,
                });
            }
            FrameKind::Cancel => {
                let status = Self::decode_trailer_metadata(&frame.inner.payload)
                    .ok()
                    .as_ref()
                    .and_then(Status::from_trailers)
                    .unwrap_or_else(|| Status::cancelled("stream reset by peer"));
                self.state = StreamDecoderState::Done;
                events.push(StreamEvent::Canceled {
                    stream_id: self.stream_id,
                    status,
                });
            }
            FrameKind::Open | FrameKind::Data => match self.state {
                StreamDecoderState::AwaitHeader => {
                    self.buffer.extend_from_slice(&frame.inner.payload);

                    if let Some((header, consumed)) = StreamHeader::decode_prefix(&self.buffer)? {
                        let remainder = self.buffer.split_off(consumed);
                        self.buffer.clear();
                        self.state = StreamDecoderState::AwaitEnvelopes;

                        events.push(StreamEvent::Opened {
                            stream_id: self.stream_id,
                            header,
                        });

                        for envelope in self.envelope_decoder.read_bytes(&remainder)? {
                            events.push(StreamEvent::Message {
                                stream_id: self.stream_id,
                                envelope,
                            });
                        }
                    }
                }
                StreamDecoderState::AwaitEnvelopes => {
                    for envelope in self.envelope_decoder.read_bytes(&frame.inner.payload)? {
                        events.push(StreamEvent::Message {
                            stream_id: self.stream_id,
                            envelope,
                        });
                    }
                }
                StreamDecoderState::Done => {
                    // Data after end-of-stream is dropped; the peer is
                    // already done with this stream id.
                }
            },
            FrameKind::WindowUpdate => {
                // Window updates are connection-routing concerns; the mux
                // session intercepts them before reaching here.
            }
        }

        Ok(events)
    }
}
