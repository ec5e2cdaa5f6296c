use bytes::Bytes;

/// A single serialized event, the atomic unit appended to a batch.
///
/// `metadata` is an optional per-event blob stored next to the payload; an empty
/// buffer means "no metadata".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBatchEvent {
    pub data: Bytes,
    pub metadata: Bytes,
}

impl RawBatchEvent {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: Bytes::new(),
        }
    }

    pub fn with_metadata(data: impl Into<Bytes>, metadata: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: metadata.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload size in bytes, metadata excluded.
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl From<&str> for RawBatchEvent {
    fn from(value: &str) -> Self {
        Self::new(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<Vec<u8>> for RawBatchEvent {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}
