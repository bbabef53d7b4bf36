use futures::{
    Stream, StreamExt,
    channel::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender},
    pin_mut,
    task::{Context, Poll},
};
use std::pin::Pin;

/// Selects the buffering strategy for a call's inbound message channel.
///
/// `Unbounded` is the default: in-flight bytes are already bounded by the
/// stream's flow-control window, so the channel cannot grow past the
/// window no matter how slowly the consumer drains it. `Bounded` trades
/// that invariant for a hard item cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicChannelType {
    Bounded(usize),
    Unbounded,
}

/// An enum to hold either a bounded or unbounded sender, unifying their
/// interfaces.
pub enum DynamicSender {
    Bounded(Sender<Vec<u8>>),
    Unbounded(UnboundedSender<Vec<u8>>),
}

impl DynamicSender {
    /// A unified, non-blocking send that ignores disconnect errors (the
    /// receiver dropping mid-call is a normal way for a call to end).
    pub fn send_and_ignore(&mut self, item: Vec<u8>) {
        match self {
            DynamicSender::Bounded(s) => {
                let _ = s.try_send(item);
            }
            DynamicSender::Unbounded(s) => {
                let _ = s.unbounded_send(item);
            }
        }
    }
}

/// An enum to hold either a bounded or unbounded receiver.
pub enum DynamicReceiver {
    Bounded(Receiver<Vec<u8>>),
    Unbounded(UnboundedReceiver<Vec<u8>>),
}

/// Implement `Stream` so the enum is consumable with
/// `while let Some(...) = rx.next().await`.
impl Stream for DynamicReceiver {
    type Item = Vec<u8>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            DynamicReceiver::Bounded(r) => {
                let stream = r;
                pin_mut!(stream);
                stream.poll_next(cx)
            }
            DynamicReceiver::Unbounded(r) => {
                let stream = r;
                pin_mut!(stream);
                stream.poll_next(cx)
            }
        }
    }
}

impl DynamicReceiver {
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.next().await
    }
}

/// Creates a sender/receiver pair of the requested flavor.
pub fn dynamic_channel(kind: DynamicChannelType) -> (DynamicSender, DynamicReceiver) {
    match kind {
        DynamicChannelType::Bounded(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            (DynamicSender::Bounded(tx), DynamicReceiver::Bounded(rx))
        }
        DynamicChannelType::Unbounded => {
            let (tx, rx) = mpsc::unbounded();
            (DynamicSender::Unbounded(tx), DynamicReceiver::Unbounded(rx))
        }
    }
}
