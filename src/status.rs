use crate::constants::{STATUS_CODE_METADATA_KEY, STATUS_MESSAGE_METADATA_KEY};
use crate::metadata::Metadata;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// The canonical status code vocabulary. Codes are wire-stable small
/// integers; unknown values decode as a corrupt trailer, never as a new
/// code.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

/// The terminal outcome of a call: a code, a human-readable message, and
/// trailing metadata.
///
/// Exactly one terminal `Status` exists per call. Once produced it is
/// immutable; every observer (interceptors, the application) sees the same
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    code: StatusCode,
    message: String,
    metadata: Metadata,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::Ok, "")
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Cancelled, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(StatusCode::DeadlineExceeded, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ResourceExhausted, message)
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    /// Builds the trailing metadata for this status: the reserved status
    /// entries first, then the user's trailing entries.
    pub fn to_trailers(&self) -> Metadata {
        let mut trailers = Metadata::new();
        // Reserved keys are known-valid; encoding them cannot fail.
        let _ = trailers.append_ascii(STATUS_CODE_METADATA_KEY, u8::from(self.code).to_string());
        if !self.message.is_empty() {
            let sanitized: String = self
                .message
                .chars()
                .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
                .collect();
            let _ = trailers.append_ascii(STATUS_MESSAGE_METADATA_KEY, sanitized);
        }
        trailers.extend(&self.metadata);
        trailers
    }

    /// Recovers a status from trailing metadata. Returns `None` when the
    /// reserved status key is absent or malformed; callers treat that as a
    /// protocol violation, not as `Ok`.
    pub fn from_trailers(trailers: &Metadata) -> Option<Status> {
        let code_str = trailers.get_ascii(STATUS_CODE_METADATA_KEY)?;
        let raw: u8 = code_str.parse().ok()?;
        let code = StatusCode::try_from(raw).ok()?;

        let message = trailers
            .get_ascii(STATUS_MESSAGE_METADATA_KEY)
            .unwrap_or("")
            .to_string();

        let mut metadata = Metadata::new();
        for (key, value) in trailers.iter() {
            if key == STATUS_CODE_METADATA_KEY || key == STATUS_MESSAGE_METADATA_KEY {
                continue;
            }
            // Entries came out of a decoded Metadata, so re-appending them
            // cannot fail validation.
            match value {
                crate::metadata::MetadataValue::Ascii(s) => {
                    let _ = metadata.append_ascii(key, s.clone());
                }
                crate::metadata::MetadataValue::Binary(b) => {
                    let _ = metadata.append_binary(key, b.clone());
                }
            }
        }

        Some(Status {
            code,
            message,
            metadata,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{:?}", self.code)
        } else {
            write!(f, "{:?}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for Status {}

impl From<std::io::Error> for Status {
    fn from(e: std::io::Error) -> Self {
        Status::unavailable(e.to_string())
    }
}
