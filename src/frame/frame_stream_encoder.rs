use crate::frame::{Frame, FrameCodec, FrameEncodeError, FrameKind};
use crate::utils::now;

/// Encodes one logical stream's bytes into framed messages.
///
/// Data is chunked at `max_chunk_size` and emitted through the `on_emit`
/// callback as raw encoded frames. Buffered partial chunks are held back
/// until enough data accumulates or `flush` is called. `End` and `Cancel`
/// frames carry their own payloads (trailing metadata, encoded status) and
/// terminate the stream; any buffered data is flushed first so control
/// payloads never mix with message bytes.
pub struct FrameStreamEncoder<F>
where
    F: FnMut(&[u8]),
{
    stream_id: u32,
    max_chunk_size: usize,
    next_seq_id: u32,
    next_kind: FrameKind,
    buffer: Vec<u8>,
    is_canceled: bool,
    is_ended: bool,
    on_emit: F,
}

impl<F> FrameStreamEncoder<F>
where
    F: FnMut(&[u8]),
{
    /// Creates a new encoder for the given stream ID and chunk limit.
    pub fn new(stream_id: u32, max_chunk_size: usize, on_emit: F) -> Self {
        Self {
            stream_id,
            max_chunk_size,
            next_seq_id: 0,
            next_kind: FrameKind::Open,
            buffer: Vec::new(),
            is_canceled: false,
            is_ended: false,
            on_emit,
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    fn check_writable(&self) -> Result<(), FrameEncodeError> {
        if self.is_canceled {
            Err(FrameEncodeError::WriteAfterCancel)
        } else if self.is_ended {
            Err(FrameEncodeError::WriteAfterEnd)
        } else {
            Ok(())
        }
    }

    fn emit_frame(&mut self, kind: FrameKind, payload: Vec<u8>) -> usize {
        let frame = Frame {
            stream_id: self.stream_id,
            seq_id: self.next_seq_id,
            kind,
            timestamp_micros: now(),
            payload,
        };

        let bytes = FrameCodec::encode(&frame);
        (self.on_emit)(&bytes);

        self.next_seq_id += 1;
        self.next_kind = FrameKind::Data;

        bytes.len()
    }

    /// Accepts some bytes, emitting zero or more full-sized frames.
    /// Buffers any leftover partial chunk internally.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize, FrameEncodeError> {
        self.check_writable()?;

        self.buffer.extend_from_slice(data);
        let mut written: usize = 0;

        while self.buffer.len() >= self.max_chunk_size {
            let chunk = self.buffer.drain(..self.max_chunk_size).collect::<Vec<_>>();
            let kind = self.next_kind;
            written += self.emit_frame(kind, chunk);
        }

        Ok(written)
    }

    /// Flushes remaining buffered data as a final (possibly partial) frame.
    pub fn flush(&mut self) -> Result<usize, FrameEncodeError> {
        self.check_writable()?;

        if self.buffer.is_empty() {
            return Ok(0);
        }

        let chunk = self.buffer.split_off(0);
        let kind = self.next_kind;
        Ok(self.emit_frame(kind, chunk))
    }

    /// Emits an `End` frame carrying `trailer_bytes`, even if no data was
    /// ever sent. Buffered data is flushed first.
    pub fn end_stream(&mut self, trailer_bytes: &[u8]) -> Result<usize, FrameEncodeError> {
        self.check_writable()?;

        let mut written = self.flush()?;

        written += self.emit_frame(FrameKind::End, trailer_bytes.to_vec());
        self.is_ended = true;

        Ok(written)
    }

    /// Emits a `Cancel` frame carrying `status_bytes` for this stream.
    /// Buffered data is discarded, not flushed.
    pub fn cancel_stream(&mut self, status_bytes: &[u8]) -> Result<usize, FrameEncodeError> {
        self.check_writable()?;

        self.buffer.clear();
        let written = self.emit_frame(FrameKind::Cancel, status_bytes.to_vec());
        self.is_canceled = true;

        Ok(written)
    }
}
