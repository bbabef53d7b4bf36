use crate::envelope::Envelope;
use crate::frame::{FrameEncodeError, FrameStreamEncoder};
use crate::metadata::Metadata;
use crate::status::Status;
use crate::stream::{FlowControlError, FlowWindow, StreamHeader, StreamSendError, StreamState};
use std::sync::Arc;

/// The outbound half of one stream.
///
/// Writes the stream header at creation, then flow-controlled envelopes,
/// and finally either a half-close (`close`, carrying trailing metadata) or
/// a reset (`cancel`, carrying a status). The local state machine is
/// enforced on every operation; writes after close fail rather than
/// corrupting the frame sequence.
///
/// The send window is shared: the connection's read task credits it when
/// the peer acknowledges consumption, which is how a blocked sender learns
/// it may retry.
pub struct StreamEncoder<F>
where
    F: FnMut(&[u8]),
{
    state: StreamState,
    send_window: Arc<FlowWindow>,
    frame_encoder: FrameStreamEncoder<F>,
}

impl<F> StreamEncoder<F>
where
    F: FnMut(&[u8]),
{
    pub(crate) fn new(
        stream_id: u32,
        max_chunk_size: usize,
        header: &StreamHeader,
        send_window: Arc<FlowWindow>,
        on_emit: F,
    ) -> Result<Self, FrameEncodeError> {
        let mut frame_encoder = FrameStreamEncoder::new(stream_id, max_chunk_size, on_emit);

        // The header is not subject to flow control and goes out
        // immediately so the peer can route the stream before the first
        // message lands.
        frame_encoder.write_bytes(&header.encode())?;
        frame_encoder.flush()?;

        Ok(Self {
            state: StreamState::Open,
            send_window,
            frame_encoder,
        })
    }

    pub fn stream_id(&self) -> u32 {
        self.frame_encoder.stream_id()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The shared send window, for observers that apply peer credits.
    pub fn send_window(&self) -> Arc<FlowWindow> {
        self.send_window.clone()
    }

    /// Sends one envelope, debiting its wire size from the send window.
    ///
    /// Fails with `WouldBlock` when the window cannot fit the whole
    /// envelope; nothing is sent or buffered in that case, so the caller
    /// can retry the identical envelope after a window update.
    pub fn send_envelope(&mut self, envelope: &Envelope) -> Result<usize, StreamSendError> {
        if !self.state.can_send() {
            return Err(StreamSendError::InvalidState(self.state));
        }

        let bytes = envelope.encode();
        self.send_window
            .reserve(bytes.len() as u32)
            .map_err(|e| match e {
                FlowControlError::WouldBlock {
                    requested,
                    available,
                } => StreamSendError::WouldBlock {
                    requested,
                    available,
                },
                FlowControlError::Overflow => StreamSendError::InvalidState(self.state),
            })?;

        let mut written = self.frame_encoder.write_bytes(&bytes)?;
        written += self.frame_encoder.flush()?;
        Ok(written)
    }

    /// Half-closes the sending side, emitting an `End` frame with the
    /// given trailing metadata. Further sends fail.
    pub fn close(&mut self, trailers: &Metadata) -> Result<usize, StreamSendError> {
        if !self.state.can_send() {
            return Err(StreamSendError::InvalidState(self.state));
        }

        let written = self.frame_encoder.end_stream(&trailers.encode())?;
        self.state = self.state.close_local().map_err(|_| {
            // can_send was checked above; the transition cannot fail.
            StreamSendError::InvalidState(self.state)
        })?;
        Ok(written)
    }

    /// Resets the stream with `status`. Idempotent: cancelling an already
    /// closed stream is a no-op.
    pub fn cancel(&mut self, status: &Status) -> Result<usize, StreamSendError> {
        if self.state.is_closed() {
            return Ok(0);
        }

        let written = match self
            .frame_encoder
            .cancel_stream(&status.to_trailers().encode())
        {
            Ok(n) => n,
            // The local half already ended; the peer will still see End.
            Err(FrameEncodeError::WriteAfterEnd) => 0,
            Err(e) => return Err(e.into()),
        };
        self.state = StreamState::Closed;
        Ok(written)
    }

    /// Marks the remote side half-closed. Called by the stream's owner when
    /// the peer's trailers arrive.
    pub fn remote_closed(&mut self) {
        if let Ok(next) = self.state.close_remote() {
            self.state = next;
        }
    }
}
