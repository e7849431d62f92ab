#![forbid(unsafe_code)]

use bytes::Bytes;

/// A chunk of stream data travelling between pads.
///
/// `offset` is the absolute byte position of the first byte in the stream,
/// stamped by the element that knows it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Buffer {
    pub data: Bytes,
    pub offset: Option<u64>,
}

impl Buffer {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            offset: None,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte position just past this buffer, when the offset is known.
    pub fn end_offset(&self) -> Option<u64> {
        self.offset.map(|offset| offset + self.data.len() as u64)
    }
}

impl From<Bytes> for Buffer {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}
