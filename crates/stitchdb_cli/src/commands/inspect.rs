//! Inspect command implementation.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use stitchdb_core::{LogRecord, LogRecordIterator, TransactionId};
use stitchdb_storage::{FileBackend, StorageBackend};
use tracing::debug;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Combined size of all bucket logs in bytes.
    pub total_size: u64,
    /// One summary per bucket log.
    pub buckets: Vec<BucketSummary>,
}

/// Statistics for a single bucket log.
#[derive(Debug, Default, Serialize)]
pub struct BucketSummary {
    /// Bucket name.
    pub bucket: String,
    /// Log size in bytes.
    pub log_size: u64,
    /// Number of readable records.
    pub records: usize,
    /// Number of `Begin` records.
    pub begins: usize,
    /// Number of `Set` records.
    pub sets: usize,
    /// Number of `Delete` records.
    pub deletes: usize,
    /// Number of `Commit` records.
    pub commits: usize,
    /// Transactions whose `Commit` record is present.
    pub committed_transactions: usize,
    /// Transactions that began but never committed.
    pub uncommitted_transactions: usize,
    /// Live keys after applying every committed transaction in order.
    pub live_keys: usize,
    /// Why reading stopped early, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut result = InspectResult {
        path: path.display().to_string(),
        total_size: 0,
        buckets: Vec::new(),
    };

    for (bucket, log_path) in super::bucket_logs(path)? {
        debug!(bucket = %bucket, path = %log_path.display(), "reading bucket log");
        let backend = FileBackend::open(&log_path)?;
        let summary = summarize(&bucket, &backend)?;
        result.total_size += summary.log_size;
        result.buckets.push(summary);
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Folds one bucket log into a summary.
///
/// Set and Delete records only count towards `live_keys` once their
/// transaction's `Commit` record has been read. A damaged record ends the
/// fold and is reported in `error`.
pub fn summarize(
    bucket: &str,
    backend: &dyn StorageBackend,
) -> Result<BucketSummary, Box<dyn std::error::Error>> {
    let mut summary = BucketSummary {
        bucket: bucket.to_owned(),
        log_size: backend.size()?,
        ..BucketSummary::default()
    };

    let mut pending: HashMap<TransactionId, Vec<LogRecord>> = HashMap::new();
    let mut live: BTreeMap<String, bool> = BTreeMap::new();

    for item in LogRecordIterator::new(backend)? {
        let record = match item {
            Ok((_, record)) => record,
            Err(err) => {
                summary.error = Some(err.to_string());
                break;
            }
        };
        summary.records += 1;

        match record {
            LogRecord::Begin { txid } => {
                summary.begins += 1;
                pending.entry(txid).or_default();
            }
            LogRecord::Set { txid, .. } => {
                summary.sets += 1;
                pending.entry(txid).or_default().push(record);
            }
            LogRecord::Delete { txid, .. } => {
                summary.deletes += 1;
                pending.entry(txid).or_default().push(record);
            }
            LogRecord::Commit { txid } => {
                summary.commits += 1;
                summary.committed_transactions += 1;
                for change in pending.remove(&txid).unwrap_or_default() {
                    apply(&mut live, &change);
                }
            }
        }
    }

    summary.uncommitted_transactions = pending.len();
    summary.live_keys = live.values().filter(|alive| **alive).count();
    Ok(summary)
}

fn apply(live: &mut BTreeMap<String, bool>, record: &LogRecord) {
    match record {
        LogRecord::Set { key, .. } => {
            let alive = record.to_entry().is_some_and(|e| e.is_live());
            live.insert(key.clone(), alive);
        }
        LogRecord::Delete { key, .. } => {
            live.remove(key);
        }
        LogRecord::Begin { .. } | LogRecord::Commit { .. } => {}
    }
}

fn print_text_output(result: &InspectResult) {
    println!("StitchDB Database: {}", result.path);
    println!("========================================");
    println!();
    println!("Buckets:     {}", result.buckets.len());
    println!("Total size:  {} bytes", result.total_size);

    for bucket in &result.buckets {
        println!();
        println!("Bucket: {}", bucket.bucket);
        println!("  Log size:      {} bytes", bucket.log_size);
        println!(
            "  Records:       {} (begin {}, set {}, delete {}, commit {})",
            bucket.records, bucket.begins, bucket.sets, bucket.deletes, bucket.commits
        );
        println!("  Committed:     {}", bucket.committed_transactions);
        println!("  Uncommitted:   {}", bucket.uncommitted_transactions);
        println!("  Live keys:     {}", bucket.live_keys);
        if let Some(ref error) = bucket.error {
            println!("  Error:         {}", error);
        }
    }
}
