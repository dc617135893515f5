//! Verify command implementation.

use std::path::Path;
use stitchdb_core::LogRecordIterator;
use stitchdb_storage::{FileBackend, StorageBackend};

/// Outcome of checking one bucket log.
#[derive(Debug)]
pub struct LogCheck {
    /// Bucket name.
    pub bucket: String,
    /// Records that passed their checksum.
    pub valid_records: usize,
    /// Bytes after the last complete record.
    pub trailing_bytes: u64,
    /// The first problem found, if any.
    pub error: Option<String>,
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying database: {}", path.display());
    println!();

    let mut failures = 0;
    for (bucket, log_path) in super::bucket_logs(path)? {
        let check = check_log(&bucket, &FileBackend::open(&log_path)?)?;
        print!("{}: {} records", check.bucket, check.valid_records);
        if check.trailing_bytes > 0 {
            print!(", {} bytes of incomplete tail", check.trailing_bytes);
        }
        match check.error {
            Some(ref error) => {
                failures += 1;
                println!(" - FAILED: {}", error);
            }
            None => println!(" - OK"),
        }
    }

    println!();
    if failures > 0 {
        return Err(format!("{failures} bucket log(s) failed verification").into());
    }
    println!("Database verification PASSED");
    Ok(())
}

/// Reads every record of a log and reports where it stops being readable.
pub fn check_log(
    bucket: &str,
    backend: &dyn StorageBackend,
) -> Result<LogCheck, Box<dyn std::error::Error>> {
    let size = backend.size()?;
    let mut check = LogCheck {
        bucket: bucket.to_owned(),
        valid_records: 0,
        trailing_bytes: 0,
        error: None,
    };

    let mut iter = LogRecordIterator::new(backend)?;
    for item in iter.by_ref() {
        match item {
            Ok(_) => check.valid_records += 1,
            Err(err) => {
                check.error = Some(err.to_string());
                break;
            }
        }
    }
    if check.error.is_none() {
        check.trailing_bytes = size - iter.offset();
    }

    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchdb_core::{Database, Entry};
    use tempfile::tempdir;

    fn committed_log(dir: &Path) -> std::path::PathBuf {
        let db = Database::open(dir).unwrap();
        db.create_bucket("b").unwrap();
        db.update("b", |tx| tx.set(Entry::new("k", "v")).map(|_| ()))
            .unwrap();
        dir.join("b.log")
    }

    #[test]
    fn clean_log_passes() {
        let temp = tempdir().unwrap();
        let log = committed_log(temp.path());
        let check = check_log("b", &FileBackend::open(&log).unwrap()).unwrap();
        assert_eq!(check.valid_records, 3);
        assert_eq!(check.trailing_bytes, 0);
        assert!(check.error.is_none());
    }

    #[test]
    fn torn_tail_is_reported_but_not_an_error() {
        let temp = tempdir().unwrap();
        let log = committed_log(temp.path());
        let mut bytes = std::fs::read(&log).unwrap();
        bytes.extend_from_slice(b"SLOG");
        std::fs::write(&log, &bytes).unwrap();

        let check = check_log("b", &FileBackend::open(&log).unwrap()).unwrap();
        assert_eq!(check.valid_records, 3);
        assert_eq!(check.trailing_bytes, 4);
        assert!(check.error.is_none());
    }

    #[test]
    fn flipped_byte_fails() {
        let temp = tempdir().unwrap();
        let log = committed_log(temp.path());
        let mut bytes = std::fs::read(&log).unwrap();
        let last = bytes.len() - 6;
        bytes[last] ^= 0xFF;
        std::fs::write(&log, &bytes).unwrap();

        let check = check_log("b", &FileBackend::open(&log).unwrap()).unwrap();
        assert_eq!(check.valid_records, 2);
        assert!(check.error.is_some());
    }
}
