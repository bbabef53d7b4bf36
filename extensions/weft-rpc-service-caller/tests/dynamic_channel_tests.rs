use weft_rpc_service_caller::{DynamicChannelType, dynamic_channel};

#[tokio::test]
async fn unbounded_channel_delivers_in_order() {
    let (mut tx, mut rx) = dynamic_channel(DynamicChannelType::Unbounded);

    tx.send_and_ignore(b"one".to_vec());
    tx.send_and_ignore(b"two".to_vec());
    tx.send_and_ignore(b"three".to_vec());

    assert_eq!(rx.recv().await.as_deref(), Some(b"one".as_ref()));
    assert_eq!(rx.recv().await.as_deref(), Some(b"two".as_ref()));
    assert_eq!(rx.recv().await.as_deref(), Some(b"three".as_ref()));
}

#[tokio::test]
async fn dropping_the_sender_ends_the_stream() {
    let (mut tx, mut rx) = dynamic_channel(DynamicChannelType::Unbounded);
    tx.send_and_ignore(b"last".to_vec());
    drop(tx);

    assert_eq!(rx.recv().await.as_deref(), Some(b"last".as_ref()));
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn bounded_channel_roundtrips() {
    let (mut tx, mut rx) = dynamic_channel(DynamicChannelType::Bounded(4));
    tx.send_and_ignore(b"item".to_vec());

    assert_eq!(rx.recv().await.as_deref(), Some(b"item".as_ref()));
}

#[tokio::test]
async fn send_after_receiver_drop_is_ignored() {
    let (mut tx, rx) = dynamic_channel(DynamicChannelType::Unbounded);
    drop(rx);
    // A normal way for a call to end; the send is simply discarded.
    tx.send_and_ignore(b"ignored".to_vec());
}
