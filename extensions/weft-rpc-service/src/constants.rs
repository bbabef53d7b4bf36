pub use weft::constants::{DEFAULT_INITIAL_WINDOW_SIZE, DEFAULT_MAX_MESSAGE_SIZE};

/// Largest frame payload emitted by the service layer's encoders.
pub const DEFAULT_SERVICE_MAX_CHUNK_SIZE: usize = 1024 * 64;
