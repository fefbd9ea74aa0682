//! Chunk - the unit of data flowing through a pipeline

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hint attached to every chunk
///
/// Passed through untouched to every sink; the fork never re-encodes data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Raw bytes
    #[default]
    Buffer,
    /// UTF-8 text
    Utf8,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer => write!(f, "buffer"),
            Self::Utf8 => write!(f, "utf8"),
        }
    }
}

/// A piece of stream data
///
/// Cloning is cheap (reference counted), so the same bytes can be handed
/// to every sink and forwarded downstream without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Bytes,
    encoding: Encoding,
}

impl Chunk {
    /// Create a raw chunk
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            encoding: Encoding::Buffer,
        }
    }

    /// Create a chunk with an explicit encoding hint
    pub fn with_encoding(data: impl Into<Bytes>, encoding: Encoding) -> Self {
        Self {
            data: data.into(),
            encoding,
        }
    }

    /// Create a UTF-8 text chunk
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(text.into()),
            encoding: Encoding::Utf8,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// View the payload as text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<&'static str> for Chunk {
    fn from(text: &'static str) -> Self {
        Self::with_encoding(Bytes::from_static(text.as_bytes()), Encoding::Utf8)
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}
