use weft::constants::MAX_WINDOW_SIZE;
use weft::stream::{FlowControlError, FlowWindow, StreamState};

#[test]
fn lifecycle_transitions() {
    let state = StreamState::Idle.open().unwrap();
    assert_eq!(state, StreamState::Open);
    assert!(state.can_send());
    assert!(state.can_receive());

    let local = state.close_local().unwrap();
    assert_eq!(local, StreamState::HalfClosedLocal);
    assert!(!local.can_send());
    assert!(local.can_receive());

    let closed = local.close_remote().unwrap();
    assert_eq!(closed, StreamState::Closed);
    assert!(!closed.can_send());
    assert!(!closed.can_receive());
}

#[test]
fn remote_then_local_also_closes() {
    let remote = StreamState::Open.close_remote().unwrap();
    assert_eq!(remote, StreamState::HalfClosedRemote);
    assert!(remote.can_send());
    assert!(!remote.can_receive());
    assert_eq!(remote.close_local().unwrap(), StreamState::Closed);
}

#[test]
fn no_transition_leaves_closed() {
    assert!(StreamState::Closed.open().is_err());
    assert!(StreamState::Closed.close_local().is_err());
    assert!(StreamState::Closed.close_remote().is_err());
}

#[test]
fn double_half_close_is_an_error() {
    let local = StreamState::Open.close_local().unwrap();
    assert!(local.close_local().is_err());
}

#[test]
fn window_reserve_is_all_or_nothing() {
    let window = FlowWindow::new(100);
    window.reserve(60).unwrap();

    match window.reserve(50) {
        Err(FlowControlError::WouldBlock {
            requested,
            available,
        }) => {
            assert_eq!(requested, 50);
            assert_eq!(available, 40);
        }
        other => panic!("expected WouldBlock, got {other:?}"),
    }

    // The failed reserve debited nothing.
    assert_eq!(window.available(), 40);
    window.reserve(40).unwrap();
    assert_eq!(window.available(), 0);
}

#[test]
fn window_credit_restores_capacity() {
    let window = FlowWindow::new(10);
    window.reserve(10).unwrap();
    assert!(window.reserve(1).is_err());

    window.credit(10).unwrap();
    window.reserve(5).unwrap();
    assert_eq!(window.available(), 5);
}

#[test]
fn window_credit_overflow_is_rejected() {
    let window = FlowWindow::new(MAX_WINDOW_SIZE - 1);
    assert_eq!(window.credit(2), Err(FlowControlError::Overflow));
    // Failed credit leaves the window unchanged.
    assert_eq!(window.available(), MAX_WINDOW_SIZE - 1);
}
