//! Log record types and serialization.

use crate::entry::Entry;
use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use bytes::Bytes;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"SLOG";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

const FLAG_VALID: u8 = 0b01;
const FLAG_EXPIRES: u8 = 0b10;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Opens the records of one commit.
    Begin = 1,
    /// Insert or replace an entry.
    Set = 2,
    /// Delete a key.
    Delete = 3,
    /// Closes the records of one commit.
    Commit = 4,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Set),
            3 => Some(Self::Delete),
            4 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One record of a bucket's durability log.
///
/// A committed transaction appears as `Begin`, its net `Set`/`Delete`
/// records, then `Commit`. Records between a `Begin` and a missing `Commit`
/// belong to a commit that never completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Opens a commit.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Insert or replace an entry.
    Set {
        /// Transaction ID.
        txid: TransactionId,
        /// Entry key.
        key: String,
        /// Entry value.
        value: Bytes,
        /// Expiration as milliseconds since the Unix epoch.
        expires_at_ms: Option<u64>,
        /// Entry validity flag.
        valid: bool,
    },

    /// Delete a key.
    Delete {
        /// Transaction ID.
        txid: TransactionId,
        /// Deleted key.
        key: String,
    },

    /// Closes a commit.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
    },
}

impl LogRecord {
    /// Builds a `Set` record carrying `entry`.
    #[must_use]
    pub fn set(txid: TransactionId, entry: &Entry) -> Self {
        Self::Set {
            txid,
            key: entry.key().to_owned(),
            value: entry.value().clone(),
            expires_at_ms: entry.expires_at().map(epoch_millis),
            valid: entry.is_valid(),
        }
    }

    /// Builds a `Delete` record.
    pub fn delete(txid: TransactionId, key: impl Into<String>) -> Self {
        Self::Delete {
            txid,
            key: key.into(),
        }
    }

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Begin { .. } => LogRecordType::Begin,
            Self::Set { .. } => LogRecordType::Set,
            Self::Delete { .. } => LogRecordType::Delete,
            Self::Commit { .. } => LogRecordType::Commit,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid }
            | Self::Set { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Commit { txid } => *txid,
        }
    }

    /// Returns the key of a `Set` or `Delete` record.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Set { key, .. } | Self::Delete { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Rebuilds the entry carried by a `Set` record.
    #[must_use]
    pub fn to_entry(&self) -> Option<Entry> {
        match self {
            Self::Set {
                key,
                value,
                expires_at_ms,
                valid,
                ..
            } => Some(Entry::from_parts(
                key.clone(),
                value.clone(),
                expires_at_ms.map(|ms| UNIX_EPOCH + Duration::from_millis(ms)),
                *valid,
            )),
            _ => None,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Fails when a key or value does not fit a 4-byte length field.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.txid().as_u64().to_le_bytes());

        match self {
            Self::Begin { .. } | Self::Commit { .. } => {}

            Self::Set {
                key,
                value,
                expires_at_ms,
                valid,
                ..
            } => {
                put_bytes(&mut buf, key.as_bytes())?;
                let mut flags = 0u8;
                if *valid {
                    flags |= FLAG_VALID;
                }
                if expires_at_ms.is_some() {
                    flags |= FLAG_EXPIRES;
                }
                buf.push(flags);
                if let Some(ms) = expires_at_ms {
                    buf.extend_from_slice(&ms.to_le_bytes());
                }
                put_bytes(&mut buf, value)?;
            }

            Self::Delete { key, .. } => {
                put_bytes(&mut buf, key.as_bytes())?;
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    pub fn decode_payload(record_type: LogRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut cursor = Cursor::new(payload);
        let txid = TransactionId::new(cursor.u64()?);

        let record = match record_type {
            LogRecordType::Begin => Self::Begin { txid },
            LogRecordType::Commit => Self::Commit { txid },
            LogRecordType::Set => {
                let key = cursor.string()?;
                let flags = cursor.u8()?;
                let expires_at_ms = if flags & FLAG_EXPIRES != 0 {
                    Some(cursor.u64()?)
                } else {
                    None
                };
                let value = Bytes::copy_from_slice(cursor.bytes()?);
                Self::Set {
                    txid,
                    key,
                    value,
                    expires_at_ms,
                    valid: flags & FLAG_VALID != 0,
                }
            }
            LogRecordType::Delete => Self::Delete {
                txid,
                key: cursor.string()?,
            },
        };

        if !cursor.is_exhausted() {
            return Err(CoreError::log_corruption(format!(
                "trailing bytes in {record_type:?} record"
            )));
        }
        Ok(record)
    }
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        CoreError::invalid_argument(format!("{} bytes exceed the log field limit", data.len()))
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| CoreError::log_corruption("unexpected end of payload"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn bytes(&mut self) -> CoreResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn string(&mut self) -> CoreResult<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CoreError::log_corruption("key is not UTF-8"))
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Seals `record` in its envelope: header, payload, trailing CRC32.
pub(crate) fn encode_frame(record: &LogRecord) -> CoreResult<Vec<u8>> {
    let payload = record.encode_payload()?;
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::invalid_argument("log record payload too large"))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&LOG_MAGIC);
    frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
    frame.push(record.record_type().as_byte());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Milliseconds since the Unix epoch for `at`, clamped at zero.
fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_bytes() {
        for t in [
            LogRecordType::Begin,
            LogRecordType::Set,
            LogRecordType::Delete,
            LogRecordType::Commit,
        ] {
            assert_eq!(LogRecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(LogRecordType::from_byte(9), None);
    }

    #[test]
    fn set_record_keeps_entry_metadata() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let entry = Entry::new("k", "v").with_expiry(at).invalidated();
        let record = LogRecord::set(TransactionId::new(3), &entry);

        let payload = record.encode_payload().unwrap();
        let decoded = LogRecord::decode_payload(LogRecordType::Set, &payload).unwrap();
        assert_eq!(decoded, record);

        let restored = decoded.to_entry().unwrap();
        assert_eq!(restored.key(), "k");
        assert_eq!(restored.expires_at(), Some(at));
        assert!(!restored.is_valid());
    }

    #[test]
    fn trailing_bytes_are_corruption() {
        let mut payload = LogRecord::Begin {
            txid: TransactionId::new(1),
        }
        .encode_payload()
        .unwrap();
        payload.push(0);
        assert!(matches!(
            LogRecord::decode_payload(LogRecordType::Begin, &payload),
            Err(CoreError::LogCorruption { .. })
        ));
    }

    #[test]
    fn short_payload_is_corruption() {
        let payload = LogRecord::delete(TransactionId::new(1), "gone")
            .encode_payload()
            .unwrap();
        assert!(LogRecord::decode_payload(LogRecordType::Delete, &payload[..10]).is_err());
    }

    #[test]
    fn frame_layout() {
        let frame = encode_frame(&LogRecord::Commit {
            txid: TransactionId::new(5),
        })
        .unwrap();
        assert_eq!(&frame[0..4], b"SLOG");
        assert_eq!(frame[6], LogRecordType::Commit.as_byte());
        assert_eq!(frame.len(), HEADER_SIZE + 8 + CRC_SIZE);

        let body = &frame[..frame.len() - CRC_SIZE];
        let stored = u32::from_le_bytes(frame[frame.len() - CRC_SIZE..].try_into().unwrap());
        assert_eq!(stored, crc32fast::hash(body));
    }
}
