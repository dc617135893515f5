//! Sequential log record reader.

use crate::error::{CoreError, CoreResult};
use crate::log::record::{LogRecord, LogRecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION};
use stitchdb_storage::StorageBackend;

/// Iterates the records of a log from offset 0.
///
/// Yields `(offset, record)` pairs. A tail too short to hold a complete
/// record ends the iteration cleanly; it is the trace of a commit whose
/// append never finished. Bad magic, an unknown type, a newer version or a
/// CRC mismatch yield one error and then stop.
///
/// ```rust
/// use stitchdb_core::log::LogRecordIterator;
/// use stitchdb_storage::InMemoryBackend;
///
/// let backend = InMemoryBackend::new();
/// let records: Vec<_> = LogRecordIterator::new(&backend).unwrap().collect();
/// assert!(records.is_empty());
/// ```
pub struct LogRecordIterator<'a> {
    backend: &'a dyn StorageBackend,
    total_size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> LogRecordIterator<'a> {
    /// Starts reading `backend` from its first byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            total_size: backend.size()?,
            backend,
            offset: 0,
            finished: false,
        })
    }

    /// Offset of the next unread record.
    ///
    /// Once iteration ends cleanly, everything past this offset is an
    /// incomplete tail.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn remaining(&self) -> u64 {
        self.total_size - self.offset
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        if self.remaining() < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        if header[0..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            return Err(CoreError::log_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let record_type = LogRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::log_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let frame_len = HEADER_SIZE + payload_len + CRC_SIZE;
        if self.remaining() < frame_len as u64 {
            return Ok(None);
        }

        let frame = self.backend.read_at(start, frame_len)?;
        let (body, crc_bytes) = frame.split_at(HEADER_SIZE + payload_len);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let record = LogRecord::decode_payload(record_type, &body[HEADER_SIZE..])?;
        self.offset += frame_len as u64;
        Ok(Some((start, record)))
    }
}

impl Iterator for LogRecordIterator<'_> {
    type Item = CoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::record::encode_frame;
    use crate::types::TransactionId;
    use stitchdb_storage::InMemoryBackend;

    fn log_of(records: &[LogRecord]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| encode_frame(r).unwrap())
            .collect()
    }

    fn sample() -> Vec<LogRecord> {
        let txid = TransactionId::new(1);
        vec![
            LogRecord::Begin { txid },
            LogRecord::delete(txid, "a"),
            LogRecord::Commit { txid },
        ]
    }

    #[test]
    fn reads_records_in_order() {
        let backend = InMemoryBackend::with_data(log_of(&sample()));
        let read: Vec<_> = LogRecordIterator::new(&backend)
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(read, sample());
    }

    #[test]
    fn truncated_tail_is_clean_end() {
        let mut bytes = log_of(&sample());
        bytes.truncate(bytes.len() - 2);
        let backend = InMemoryBackend::with_data(bytes);

        let read: Vec<_> = LogRecordIterator::new(&backend)
            .unwrap()
            .collect::<CoreResult<_>>()
            .unwrap();
        assert_eq!(read.len(), 2);
    }

    #[test]
    fn offset_stops_before_torn_tail() {
        let full = log_of(&sample());
        let mut bytes = full.clone();
        bytes.extend_from_slice(&LOG_MAGIC);
        let backend = InMemoryBackend::with_data(bytes);

        let mut iter = LogRecordIterator::new(&backend).unwrap();
        assert_eq!(iter.by_ref().count(), 3);
        assert_eq!(iter.offset(), full.len() as u64);
    }

    #[test]
    fn flipped_byte_is_checksum_mismatch() {
        let mut bytes = log_of(&sample());
        bytes[HEADER_SIZE] ^= 0xFF;
        let backend = InMemoryBackend::with_data(bytes);

        let mut iter = LogRecordIterator::new(&backend).unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(CoreError::ChecksumMismatch { .. }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = log_of(&sample());
        bytes[0] = b'X';
        let backend = InMemoryBackend::with_data(bytes);

        let first = LogRecordIterator::new(&backend).unwrap().next();
        assert!(matches!(first, Some(Err(CoreError::LogCorruption { .. }))));
    }
}
