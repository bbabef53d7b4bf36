use crate::constants::MAX_WINDOW_SIZE;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Byte credit governing how much may be sent on one stream direction
/// before the peer acknowledges consumption.
///
/// The window is lock-free so the connection's read task can credit it
/// while the call task is mid-send. A `reserve` either debits the full
/// request or fails with `WouldBlock`; partial debits never happen, so a
/// blocked send leaves the window untouched and framing intact.
#[derive(Debug)]
pub struct FlowWindow {
    available: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControlError {
    /// The requested reservation exceeds the available credit. The caller
    /// must wait for a window update before retrying.
    WouldBlock { requested: u32, available: u32 },

    /// Crediting would push the window past [`MAX_WINDOW_SIZE`]; the peer
    /// is misbehaving.
    Overflow,
}

impl fmt::Display for FlowControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowControlError::WouldBlock {
                requested,
                available,
            } => write!(
                f,
                "flow-control window exhausted ({requested} bytes requested, {available} available)"
            ),
            FlowControlError::Overflow => write!(f, "flow-control window overflow"),
        }
    }
}

impl std::error::Error for FlowControlError {}

impl FlowWindow {
    pub fn new(initial: u32) -> Self {
        Self {
            available: AtomicU32::new(initial),
        }
    }

    pub fn available(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    /// Debits `bytes` from the window, or fails with `WouldBlock` leaving
    /// the window unchanged.
    pub fn reserve(&self, bytes: u32) -> Result<(), FlowControlError> {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if bytes > current {
                return Err(FlowControlError::WouldBlock {
                    requested: bytes,
                    available: current,
                });
            }
            match self.available.compare_exchange_weak(
                current,
                current - bytes,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    /// Returns credit to the window, failing on overflow past
    /// [`MAX_WINDOW_SIZE`].
    pub fn credit(&self, bytes: u32) -> Result<u32, FlowControlError> {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            let next = current
                .checked_add(bytes)
                .filter(|n| *n <= MAX_WINDOW_SIZE)
                .ok_or(FlowControlError::Overflow)?;
            match self.available.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(next),
                Err(observed) => current = observed,
            }
        }
    }
}
