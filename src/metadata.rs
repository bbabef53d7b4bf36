use crate::constants::METADATA_BINARY_KEY_SUFFIX;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fmt;

/// A single metadata value. Keys ending in `-bin` carry binary values,
/// which travel base64-encoded on the wire; every other key carries
/// printable ASCII.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Ascii(String),
    Binary(Vec<u8>),
}

/// An ordered multimap of ASCII keys to string or binary values.
///
/// Duplicate keys are preserved in insertion order. A `Metadata` is built
/// mutably while composing an outbound message and treated as immutable
/// once attached to a sent stream header or trailer.
///
/// Wire layout: `[count:u16]` then per entry
/// `[key_len:u16][key][val_len:u32][val]`, values always ASCII (base64 for
/// `-bin` keys).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataError {
    /// The key is empty, non-ASCII, or contains uppercase characters.
    InvalidKey(String),

    /// An ASCII value was supplied for a `-bin` key, or a binary value for
    /// a non-`-bin` key.
    KeyValueMismatch(String),

    /// The value contains non-printable or non-ASCII bytes.
    InvalidValue(String),

    /// The wire bytes did not conform to the metadata layout.
    Corrupt,
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::InvalidKey(key) => write!(f, "invalid metadata key {key:?}"),
            MetadataError::KeyValueMismatch(key) => {
                write!(f, "value kind does not match key {key:?}")
            }
            MetadataError::InvalidValue(key) => {
                write!(f, "non-ASCII metadata value for key {key:?}")
            }
            MetadataError::Corrupt => write!(f, "corrupt metadata block"),
        }
    }
}

impl std::error::Error for MetadataError {}

fn validate_key(key: &str) -> Result<(), MetadataError> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_' || b == b'.');
    if valid {
        Ok(())
    } else {
        Err(MetadataError::InvalidKey(key.to_string()))
    }
}

fn is_binary_key(key: &str) -> bool {
    key.ends_with(METADATA_BINARY_KEY_SUFFIX)
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an ASCII value. Duplicates are kept; insertion order is
    /// preserved.
    pub fn append_ascii(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MetadataError> {
        let key = key.into();
        validate_key(&key)?;
        if is_binary_key(&key) {
            return Err(MetadataError::KeyValueMismatch(key));
        }
        let value = value.into();
        if !value.bytes().all(|b| (0x20..0x7f).contains(&b)) {
            return Err(MetadataError::InvalidValue(key));
        }
        self.entries.push((key, MetadataValue::Ascii(value)));
        Ok(())
    }

    /// Appends a binary value; the key must end in `-bin`.
    pub fn append_binary(
        &mut self,
        key: impl Into<String>,
        value: Vec<u8>,
    ) -> Result<(), MetadataError> {
        let key = key.into();
        validate_key(&key)?;
        if !is_binary_key(&key) {
            return Err(MetadataError::KeyValueMismatch(key));
        }
        self.entries.push((key, MetadataValue::Binary(value)));
        Ok(())
    }

    /// Returns the first value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the first ASCII value for `key`, if any.
    pub fn get_ascii(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(MetadataValue::Ascii(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns every value for `key` in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a MetadataValue> {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Removes every entry for `key`, returning the removed values.
    pub fn remove(&mut self, key: &str) -> Vec<MetadataValue> {
        let mut removed = Vec::new();
        self.entries.retain(|(k, v)| {
            if k == key {
                removed.push(v.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Appends every entry of `other` after this map's entries.
    pub fn extend(&mut self, other: &Metadata) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Serializes into the wire layout. Binary values are base64-encoded
    /// here; the receiver decodes them transparently in [`Metadata::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(&(self.entries.len() as u16).to_le_bytes());

        for (key, value) in &self.entries {
            buf.extend(&(key.len() as u16).to_le_bytes());
            buf.extend(key.as_bytes());

            let wire_value: Vec<u8> = match value {
                MetadataValue::Ascii(s) => s.as_bytes().to_vec(),
                MetadataValue::Binary(b) => BASE64.encode(b).into_bytes(),
            };
            buf.extend(&(wire_value.len() as u32).to_le_bytes());
            buf.extend(&wire_value);
        }

        buf
    }

    /// Parses the wire layout back into a `Metadata`. The whole block must
    /// be present; streaming reassembly happens a layer below.
    pub fn decode(bytes: &[u8]) -> Result<Metadata, MetadataError> {
        let mut offset = 0usize;

        let count = read_u16(bytes, &mut offset)? as usize;
        let mut entries = Vec::with_capacity(count);

        for _ in 0..count {
            let key_len = read_u16(bytes, &mut offset)? as usize;
            let key_bytes = read_slice(bytes, &mut offset, key_len)?;
            let key = std::str::from_utf8(key_bytes)
                .map_err(|_| MetadataError::Corrupt)?
                .to_string();
            validate_key(&key)?;

            let val_len = read_u32(bytes, &mut offset)? as usize;
            let val_bytes = read_slice(bytes, &mut offset, val_len)?;

            let value = if is_binary_key(&key) {
                let decoded = BASE64
                    .decode(val_bytes)
                    .map_err(|_| MetadataError::Corrupt)?;
                MetadataValue::Binary(decoded)
            } else {
                let s = std::str::from_utf8(val_bytes)
                    .map_err(|_| MetadataError::Corrupt)?
                    .to_string();
                MetadataValue::Ascii(s)
            };

            entries.push((key, value));
        }

        if offset != bytes.len() {
            return Err(MetadataError::Corrupt);
        }

        Ok(Metadata { entries })
    }
}

fn read_u16(bytes: &[u8], offset: &mut usize) -> Result<u16, MetadataError> {
    let end = offset.checked_add(2).ok_or(MetadataError::Corrupt)?;
    let slice = bytes.get(*offset..end).ok_or(MetadataError::Corrupt)?;
    *offset = end;
    Ok(u16::from_le_bytes(slice.try_into().unwrap()))
}

fn read_u32(bytes: &[u8], offset: &mut usize) -> Result<u32, MetadataError> {
    let end = offset.checked_add(4).ok_or(MetadataError::Corrupt)?;
    let slice = bytes.get(*offset..end).ok_or(MetadataError::Corrupt)?;
    *offset = end;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_slice<'a>(
    bytes: &'a [u8],
    offset: &mut usize,
    len: usize,
) -> Result<&'a [u8], MetadataError> {
    let end = offset.checked_add(len).ok_or(MetadataError::Corrupt)?;
    let slice = bytes.get(*offset..end).ok_or(MetadataError::Corrupt)?;
    *offset = end;
    Ok(slice)
}
