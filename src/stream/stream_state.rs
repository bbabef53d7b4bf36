use std::fmt;

/// The per-stream lifecycle state machine.
///
/// `idle → open → {half-closed-local, half-closed-remote} → closed`
///
/// `Closed` is terminal: it is reached when both directions have
/// half-closed, when either side cancels, or when the owning transport
/// fails. No transition leads out of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStateError {
    pub from: StreamState,
    pub op: &'static str,
}

impl fmt::Display for StreamStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid stream transition {:?} in state {:?}", self.op, self.from)
    }
}

impl std::error::Error for StreamStateError {}

impl StreamState {
    pub fn open(self) -> Result<StreamState, StreamStateError> {
        match self {
            StreamState::Idle => Ok(StreamState::Open),
            from => Err(StreamStateError { from, op: "open" }),
        }
    }

    /// Half-closes the sending side.
    pub fn close_local(self) -> Result<StreamState, StreamStateError> {
        match self {
            StreamState::Open => Ok(StreamState::HalfClosedLocal),
            StreamState::HalfClosedRemote => Ok(StreamState::Closed),
            from => Err(StreamStateError {
                from,
                op: "close_local",
            }),
        }
    }

    /// Half-closes the receiving side.
    pub fn close_remote(self) -> Result<StreamState, StreamStateError> {
        match self {
            StreamState::Open => Ok(StreamState::HalfClosedRemote),
            StreamState::HalfClosedLocal => Ok(StreamState::Closed),
            from => Err(StreamStateError {
                from,
                op: "close_remote",
            }),
        }
    }

    pub fn can_send(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedRemote)
    }

    pub fn can_receive(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedLocal)
    }

    pub fn is_closed(self) -> bool {
        self == StreamState::Closed
    }
}
