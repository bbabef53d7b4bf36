use crate::constants::{FRAME_HEADER_SIZE, FRAME_LENGTH_FIELD_SIZE};
use crate::frame::{DecodedFrame, FrameCodec, FrameDecodeError, FrameKind};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A multiplexing frame decoder for interleaved stream data.
///
/// `FrameMuxStreamDecoder` accepts a continuous stream of bytes that may
/// contain multiple interleaved logical streams, each identified by a
/// `stream_id`.
///
/// The decoder maintains reassembly state per stream, emitting complete,
/// in-order frames only when all prior frames for that stream have arrived.
/// Out-of-order delivery within a stream is tolerated; ordering across
/// streams is never guaranteed.
///
/// ### Behavior Summary:
/// - A `Cancel` frame bypasses reassembly, is delivered immediately, and
///   removes the stream's buffered state.
/// - A `WindowUpdate` frame also bypasses reassembly; flow-control credit
///   must not stall behind buffered data.
/// - An `End` frame marks the stream complete; its state is reclaimed once
///   buffered frames have been flushed.
/// - Malformed frames yield `CorruptFrame`.
pub struct FrameMuxStreamDecoder {
    buffer: Vec<u8>,                         // Holds partial frame data
    streams: HashMap<u32, StreamReassembly>, // Stores reassembled frames
}

struct StreamReassembly {
    next_expected: u32,
    buffer: BTreeMap<u32, DecodedFrame>, // Holds frames that are out-of-order
    is_ended: bool,
}

pub struct FrameDecoderIterator {
    queue: VecDeque<Result<DecodedFrame, FrameDecodeError>>,
}

impl Iterator for FrameDecoderIterator {
    type Item = Result<DecodedFrame, FrameDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front()
    }
}

impl Default for FrameMuxStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameMuxStreamDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            streams: HashMap::new(),
        }
    }

    /// Reads new bytes and attempts to decode them into in-order frames.
    pub fn read_bytes(&mut self, data: &[u8]) -> FrameDecoderIterator {
        self.buffer.extend_from_slice(data);
        let mut queue = VecDeque::new();

        while self.buffer.len() >= FRAME_LENGTH_FIELD_SIZE {
            let len = match self
                .buffer
                .get(..FRAME_LENGTH_FIELD_SIZE)
                .and_then(|bytes| bytes.try_into().ok())
                .map(u32::from_le_bytes)
            {
                Some(n) => n as usize,
                None => {
                    queue.push_back(Err(FrameDecodeError::IncompleteHeader));
                    break;
                }
            };

            let total = FRAME_HEADER_SIZE + len;

            if self.buffer.len() < total {
                break;
            }

            match FrameCodec::decode(&self.buffer[..total]) {
                Ok(frame) => {
                    let stream_id = frame.inner.stream_id;
                    let frame_kind = frame.inner.kind;

                    self.buffer.drain(..total);

                    // Control frames skip reassembly entirely. Cancel tears
                    // the stream down; WindowUpdate must reach the sender
                    // even while data frames are still buffering.
                    if frame_kind == FrameKind::Cancel {
                        self.streams.remove(&stream_id);
                        queue.push_back(Ok(frame));
                        continue;
                    }

                    if frame_kind == FrameKind::WindowUpdate {
                        queue.push_back(Ok(frame));
                        continue;
                    }

                    let stream =
                        self.streams
                            .entry(stream_id)
                            .or_insert_with(|| StreamReassembly {
                                next_expected: 0,
                                buffer: BTreeMap::new(),
                                is_ended: false,
                            });

                    if frame_kind == FrameKind::End {
                        stream.is_ended = true;
                    }

                    stream.buffer.insert(frame.inner.seq_id, frame);

                    while let Some(buffered_frame) = stream.buffer.remove(&stream.next_expected) {
                        stream.next_expected += 1;
                        queue.push_back(Ok(buffered_frame));
                    }

                    if stream.is_ended && stream.buffer.is_empty() {
                        self.streams.remove(&stream_id);
                    }
                }
                Err(e) => {
                    self.buffer.drain(..total);
                    queue.push_back(Err(e));
                    continue;
                }
            }
        }

        FrameDecoderIterator { queue }
    }
}
