//! On-disk batch format.
//!
//! A batch file is a sequence of events, each stored as a metadata block followed
//! by a data block. A block is a 2-byte big-endian type, a 4-byte big-endian
//! length and the raw bytes:
//!
//! ```text
//! +--------+----------+----------------+--------+----------+------------+
//! | 0x0001 | len: u32 | metadata bytes | 0x0000 | len: u32 | data bytes |
//! +--------+----------+----------------+--------+----------+------------+
//! ```

use crate::domain::{LogLevel, LogTarget, RawBatchEvent};
use crate::internal_logger::InternalLogger;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const TYPE_SIZE: usize = 2;
const LENGTH_SIZE: usize = 4;
const HEADER_SIZE: usize = TYPE_SIZE + LENGTH_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BlockType {
    Data = 0x00,
    Metadata = 0x01,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected block type: expected {expected:#06x}, found {actual:#06x}")]
    UnexpectedBlockType { expected: u16, actual: u16 },
    #[error("Truncated block: expected {expected} bytes, {available} available")]
    Truncated { expected: usize, available: usize },
}

/// Events decoded from a batch, and the error that stopped decoding if any.
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub events: Vec<RawBatchEvent>,
    pub error: Option<CodecError>,
}

pub fn encode_event(event: &RawBatchEvent) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 * HEADER_SIZE + event.metadata.len() + event.data.len());
    put_block(&mut buf, BlockType::Metadata, &event.metadata);
    put_block(&mut buf, BlockType::Data, &event.data);
    buf.freeze()
}

fn put_block(buf: &mut BytesMut, block_type: BlockType, bytes: &[u8]) {
    buf.put_u16(block_type as u16);
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

/// Decodes as many complete events as possible.
pub fn decode_events(mut bytes: Bytes) -> DecodedBatch {
    let mut decoded = DecodedBatch::default();
    while bytes.has_remaining() {
        let event = take_block(&mut bytes, BlockType::Metadata).and_then(|metadata| {
            take_block(&mut bytes, BlockType::Data).map(|data| RawBatchEvent { data, metadata })
        });
        match event {
            Ok(event) => decoded.events.push(event),
            Err(e) => {
                decoded.error = Some(e);
                break;
            }
        }
    }
    decoded
}

fn take_block(bytes: &mut Bytes, expected: BlockType) -> Result<Bytes, CodecError> {
    if bytes.remaining() < HEADER_SIZE {
        return Err(CodecError::Truncated {
            expected: HEADER_SIZE,
            available: bytes.remaining(),
        });
    }
    let actual = bytes.get_u16();
    if actual != expected as u16 {
        return Err(CodecError::UnexpectedBlockType {
            expected: expected as u16,
            actual,
        });
    }
    let length = bytes.get_u32() as usize;
    if bytes.remaining() < length {
        return Err(CodecError::Truncated {
            expected: length,
            available: bytes.remaining(),
        });
    }
    Ok(bytes.split_to(length))
}

/// Appends encoded events to batch files and reads them back.
///
/// I/O failures are reported through the internal logger and never surface as errors.
#[derive(Clone)]
pub struct BatchFileReaderWriter {
    logger: Arc<dyn InternalLogger>,
}

impl BatchFileReaderWriter {
    pub fn new(logger: Arc<dyn InternalLogger>) -> Self {
        Self { logger }
    }

    pub async fn write_event(&self, file: &Path, event: &RawBatchEvent) -> bool {
        let encoded = encode_event(event);
        match append(file, &encoded).await {
            Ok(()) => true,
            Err(e) => {
                self.logger.log(
                    LogLevel::Error,
                    &[LogTarget::Maintainer, LogTarget::Telemetry],
                    &format!("Unable to write data to file {}: {e}", file.display()),
                );
                false
            }
        }
    }

    pub async fn read_events(&self, file: &Path) -> Vec<RawBatchEvent> {
        let bytes = match fs::read(file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.logger.log_one(
                    LogLevel::Error,
                    LogTarget::Maintainer,
                    &format!("Unable to read data from file {}: file does not exist", file.display()),
                );
                return Vec::new();
            }
            Err(e) => {
                self.logger.log(
                    LogLevel::Error,
                    &[LogTarget::Maintainer, LogTarget::Telemetry],
                    &format!("Unable to read data from file {}: {e}", file.display()),
                );
                return Vec::new();
            }
        };

        let total = bytes.len();
        let decoded = decode_events(Bytes::from(bytes));
        if let Some(error) = decoded.error {
            self.logger.log(
                LogLevel::Error,
                &[LogTarget::User, LogTarget::Telemetry],
                &format!(
                    "File {} is probably corrupted, not all content was read ({} events, {total} bytes): {error}",
                    file.display(),
                    decoded.events.len()
                ),
            );
        }
        decoded.events
    }
}

/// Raw byte files, used for batch metadata.
#[derive(Clone)]
pub struct PlainFileReaderWriter {
    logger: Arc<dyn InternalLogger>,
}

impl PlainFileReaderWriter {
    pub fn new(logger: Arc<dyn InternalLogger>) -> Self {
        Self { logger }
    }

    pub async fn write_data(&self, file: &Path, data: &[u8], append_data: bool) -> bool {
        let result = if append_data {
            append(file, data).await
        } else {
            fs::write(file, data).await
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                self.logger.log(
                    LogLevel::Error,
                    &[LogTarget::Maintainer, LogTarget::Telemetry],
                    &format!("Unable to write data to file {}: {e}", file.display()),
                );
                false
            }
        }
    }

    pub async fn read_data(&self, file: &Path) -> Option<Bytes> {
        match fs::read(file).await {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) => {
                self.logger.log_one(
                    LogLevel::Error,
                    LogTarget::Maintainer,
                    &format!("Unable to read data from file {}: {e}", file.display()),
                );
                None
            }
        }
    }
}

async fn append(file: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut handle = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .await?;
    handle.write_all(data).await?;
    handle.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Vec<RawBatchEvent> {
        vec![
            RawBatchEvent::with_metadata(r#"{"message":"a"}"#, "m1"),
            RawBatchEvent::new(r#"{"message":"b"}"#),
            RawBatchEvent::with_metadata(r#"{"message":"c"}"#, "m3"),
        ]
    }

    fn encode_all(events: &[RawBatchEvent]) -> Bytes {
        let mut buf = BytesMut::new();
        for event in events {
            buf.extend_from_slice(&encode_event(event));
        }
        buf.freeze()
    }

    #[test]
    fn test_event_layout() {
        let encoded = encode_event(&RawBatchEvent::with_metadata("ab", "m"));

        assert_eq!(
            encoded.as_ref(),
            &[0x00, 0x01, 0, 0, 0, 1, b'm', 0x00, 0x00, 0, 0, 0, 2, b'a', b'b']
        );
    }

    #[test]
    fn test_decode_preserves_order() {
        let decoded = decode_events(encode_all(&events()));

        assert!(decoded.error.is_none());
        assert_eq!(decoded.events, events());
    }

    #[test]
    fn test_truncated_stream_keeps_complete_events() {
        let encoded = encode_all(&events());
        let truncated = encoded.slice(..encoded.len() - 3);

        let decoded = decode_events(truncated);

        assert_eq!(decoded.events, events()[..2].to_vec());
        assert!(matches!(decoded.error, Some(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_unexpected_block_type_stops_decoding() {
        let mut buf = BytesMut::from(encode_all(&events()[..1]).as_ref());
        put_block(&mut buf, BlockType::Data, b"orphan");

        let decoded = decode_events(buf.freeze());

        assert_eq!(decoded.events.len(), 1);
        assert_eq!(
            decoded.error,
            Some(CodecError::UnexpectedBlockType {
                expected: BlockType::Metadata as u16,
                actual: BlockType::Data as u16,
            })
        );
    }

    #[test]
    fn test_empty_input_decodes_to_nothing() {
        let decoded = decode_events(Bytes::new());
        assert!(decoded.events.is_empty());
        assert!(decoded.error.is_none());
    }
}
