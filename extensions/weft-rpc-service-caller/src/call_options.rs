use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weft::metadata::Metadata;

/// Per-call options: outbound initial metadata, an optional deadline, and
/// the cancellation token the call runs under.
///
/// The token is cooperative and hierarchical: passing a child of a scope's
/// token means cancelling the scope cancels every call opened within it.
/// A deadline is the same mechanism triggered by a timer instead of the
/// caller.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub metadata: Metadata,
    pub deadline: Option<Duration>,
    pub cancel: CancellationToken,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
