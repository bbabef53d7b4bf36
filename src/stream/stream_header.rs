use crate::constants::{STREAM_HEADER_METADATA_LENGTH_SIZE, STREAM_HEADER_PATH_LENGTH_SIZE};
use crate::metadata::Metadata;
use crate::stream::StreamDecodeError;

/// The block every stream starts with: the method path being invoked and
/// the caller's initial metadata.
///
/// Reply streams reuse the request's stream id and carry an empty path.
/// The path is an opaque, case-sensitive `/package.Service/Method` string;
/// the core never interprets its structure.
///
/// Wire layout: `[path_len:u16][path][meta_len:u16][metadata]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamHeader {
    pub method_path: String,
    pub metadata: Metadata,
}

impl StreamHeader {
    pub fn new(method_path: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            method_path: method_path.into(),
            metadata,
        }
    }

    /// A header for a reply stream: no path, optional initial metadata.
    pub fn reply(metadata: Metadata) -> Self {
        Self {
            method_path: String::new(),
            metadata,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let meta_bytes = self.metadata.encode();
        let mut buf = Vec::with_capacity(
            STREAM_HEADER_PATH_LENGTH_SIZE
                + self.method_path.len()
                + STREAM_HEADER_METADATA_LENGTH_SIZE
                + meta_bytes.len(),
        );
        buf.extend(&(self.method_path.len() as u16).to_le_bytes());
        buf.extend(self.method_path.as_bytes());
        buf.extend(&(meta_bytes.len() as u16).to_le_bytes());
        buf.extend(&meta_bytes);
        buf
    }

    /// Attempts to parse a header from the front of `bytes`.
    ///
    /// Returns `Ok(None)` when more bytes are needed (headers may arrive
    /// split across frames), or the header plus the number of bytes it
    /// consumed.
    pub fn decode_prefix(bytes: &[u8]) -> Result<Option<(StreamHeader, usize)>, StreamDecodeError> {
        if bytes.len() < STREAM_HEADER_PATH_LENGTH_SIZE {
            return Ok(None);
        }
        let path_len = u16::from_le_bytes(bytes[..2].try_into().unwrap()) as usize;

        let meta_len_offset = STREAM_HEADER_PATH_LENGTH_SIZE + path_len;
        if bytes.len() < meta_len_offset + STREAM_HEADER_METADATA_LENGTH_SIZE {
            return Ok(None);
        }
        let meta_len = u16::from_le_bytes(
            bytes[meta_len_offset..meta_len_offset + STREAM_HEADER_METADATA_LENGTH_SIZE]
                .try_into()
                .unwrap(),
        ) as usize;

        let total = meta_len_offset + STREAM_HEADER_METADATA_LENGTH_SIZE + meta_len;
        if bytes.len() < total {
            return Ok(None);
        }

        let method_path = std::str::from_utf8(&bytes[STREAM_HEADER_PATH_LENGTH_SIZE..meta_len_offset])
            .map_err(|_| StreamDecodeError::CorruptHeader)?
            .to_string();

        let metadata = Metadata::decode(
            &bytes[meta_len_offset + STREAM_HEADER_METADATA_LENGTH_SIZE..total],
        )?;

        Ok(Some((
            StreamHeader {
                method_path,
                metadata,
            },
            total,
        )))
    }
}
