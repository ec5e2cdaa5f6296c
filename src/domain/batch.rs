use super::RawBatchEvent;
use bytes::Bytes;
use std::fmt;
use std::path::Path;

/// Stable handle on a persisted batch, derived from its file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchId(String);

impl BatchId {
    pub fn from_file(file: &Path) -> Self {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self(name)
    }

    pub fn matches_file(&self, file: &Path) -> bool {
        file.file_name()
            .is_some_and(|name| name.to_string_lossy() == self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A batch read from the store: its handle, events in append order and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchData {
    pub id: BatchId,
    pub data: Vec<RawBatchEvent>,
    pub metadata: Option<Bytes>,
}

impl BatchData {
    /// Total payload size of the events, used for status reporting.
    pub fn byte_size(&self) -> usize {
        self.data.iter().map(RawBatchEvent::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_batch_id_matches_its_file() {
        let file = PathBuf::from("/tmp/logs-v2/1700000000000");
        let id = BatchId::from_file(&file);

        assert_eq!(id.as_str(), "1700000000000");
        assert!(id.matches_file(&file));
        assert!(!id.matches_file(&PathBuf::from("/tmp/logs-v2/1700000000001")));
    }

    #[test]
    fn test_byte_size_sums_payloads_only() {
        let batch = BatchData {
            id: BatchId::from_file(Path::new("1")),
            data: vec![
                RawBatchEvent::with_metadata("abc", "meta"),
                RawBatchEvent::new("de"),
            ],
            metadata: Some(Bytes::from_static(b"ignored")),
        };

        assert_eq!(batch.byte_size(), 5);
    }
}
