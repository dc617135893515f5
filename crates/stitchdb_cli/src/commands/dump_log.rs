//! Dump log command implementation.

use serde::Serialize;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use stitchdb_core::dir::log_path;
use stitchdb_core::{LogRecord, LogRecordIterator};
use stitchdb_storage::{FileBackend, StorageBackend};

/// Log record representation for output.
#[derive(Debug, Serialize)]
pub struct LogRecordInfo {
    /// Offset in the log file.
    pub offset: u64,
    /// Record type.
    pub record_type: String,
    /// Transaction ID.
    pub txid: u64,
    /// Entry key (set and delete records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Value size in bytes (set records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_size: Option<usize>,
    /// Value as text when it is valid UTF-8 (set records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Expiration in milliseconds since the Unix epoch (set records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    /// Validity flag (set records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl LogRecordInfo {
    fn new(offset: u64, record: &LogRecord) -> Self {
        let mut info = Self {
            offset,
            record_type: format!("{:?}", record.record_type()).to_uppercase(),
            txid: record.txid().as_u64(),
            key: record.key().map(str::to_owned),
            value_size: None,
            value: None,
            expires_at_ms: None,
            valid: None,
        };
        if let LogRecord::Set {
            value,
            expires_at_ms,
            valid,
            ..
        } = record
        {
            info.value_size = Some(value.len());
            info.value = std::str::from_utf8(value).ok().map(str::to_owned);
            info.expires_at_ms = *expires_at_ms;
            info.valid = Some(*valid);
        }
        info
    }
}

/// Runs the dump-log command.
pub fn run(
    path: &Path,
    bucket: &str,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = log_path(path, bucket);
    if !log.exists() {
        return Err(format!("No log for bucket {bucket} at {}", log.display()).into());
    }

    let backend = FileBackend::open(&log)?;
    let records = read_records(&backend, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(bucket, &records);
        }
    }

    Ok(())
}

/// Reads up to `limit` records from the start of the log.
pub fn read_records(
    backend: &dyn StorageBackend,
    limit: Option<usize>,
) -> Result<Vec<LogRecordInfo>, Box<dyn std::error::Error>> {
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    for item in LogRecordIterator::new(backend)?.take(max_records) {
        let (offset, record) = item?;
        records.push(LogRecordInfo::new(offset, &record));
    }
    Ok(records)
}

fn print_text_output(bucket: &str, records: &[LogRecordInfo]) {
    println!("Log of bucket {} ({} records)", bucket, records.len());
    println!("================");
    println!();

    for record in records {
        print!("[{:08}] {:8} txid={}", record.offset, record.record_type, record.txid);

        if let Some(ref key) = record.key {
            print!(" key={:?}", key);
        }
        if let Some(size) = record.value_size {
            print!(" value={} bytes", size);
        }
        if let Some(ms) = record.expires_at_ms {
            let at = UNIX_EPOCH + Duration::from_millis(ms);
            print!(" expires={:?}", at);
        }
        if record.valid == Some(false) {
            print!(" invalid");
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchdb_core::{Database, Entry};
    use tempfile::tempdir;

    #[test]
    fn reads_records_with_limit() {
        let temp = tempdir().unwrap();
        {
            let db = Database::open(temp.path()).unwrap();
            db.create_bucket("b").unwrap();
            db.update("b", |tx| tx.set(Entry::new("k", "hello")).map(|_| ()))
                .unwrap();
        }

        let backend = FileBackend::open(&temp.path().join("b.log")).unwrap();
        let all = read_records(&backend, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].record_type, "BEGIN");
        assert_eq!(all[1].record_type, "SET");
        assert_eq!(all[1].key.as_deref(), Some("k"));
        assert_eq!(all[1].value.as_deref(), Some("hello"));
        assert_eq!(all[1].valid, Some(true));
        assert_eq!(all[2].record_type, "COMMIT");

        assert_eq!(read_records(&backend, Some(1)).unwrap().len(), 1);
    }
}
