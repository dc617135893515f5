//! Commit durability against real files and failing backends.

mod common;

use common::json;
use std::time::Duration;
use stitchdb_core::{
    Config, CoreError, Database, Entry, IndexRule, LogRecord, LogRecordIterator, SyncPolicy,
    TxMode,
};
use stitchdb_storage::{FileBackend, InMemoryBackend};
use tempfile::tempdir;

fn records_in(path: &std::path::Path) -> Vec<LogRecord> {
    let backend = FileBackend::open(path).unwrap();
    LogRecordIterator::new(&backend)
        .unwrap()
        .map(|item| item.unwrap().1)
        .collect()
}

#[test]
fn committed_transactions_reach_the_file() {
    let temp = tempdir().unwrap();
    {
        let db = Database::open(temp.path()).unwrap();
        db.create_bucket("users").unwrap();
        db.update("users", |tx| {
            tx.set(Entry::new("ada", json(36)))?;
            tx.set(Entry::new("alan", json(41)))?;
            Ok(())
        })
        .unwrap();
        db.update("users", |tx| tx.delete("alan").map(|_| ()))
            .unwrap();
        db.close().unwrap();
    }

    let records = records_in(&temp.path().join("users.log"));
    let kinds: Vec<_> = records
        .iter()
        .map(|r| (r.record_type().as_byte(), r.key().map(str::to_owned)))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (1, None),
            (2, Some("ada".to_owned())),
            (2, Some("alan".to_owned())),
            (4, None),
            (1, None),
            (3, Some("alan".to_owned())),
            (4, None),
        ]
    );
    assert_ne!(records[0].txid(), records[4].txid());
}

#[test]
fn rolled_back_and_empty_transactions_write_nothing() {
    let db = Database::open_in_memory().unwrap();
    let log = InMemoryBackend::new();
    db.create_bucket_with_backend("b", Box::new(log.clone()))
        .unwrap();

    let mut tx = db.begin("b", TxMode::ReadWrite).unwrap();
    tx.set(Entry::new("a", "1")).unwrap();
    tx.rollback().unwrap();

    db.update("b", |tx| {
        tx.create_index("i", IndexRule::int("n"))?;
        tx.set(Entry::new("tmp", "1"))?;
        tx.delete("tmp")?;
        Ok(())
    })
    .unwrap();

    assert!(log.bytes().is_empty());
}

#[test]
fn failed_commit_reverts_memory_and_log() {
    let db = Database::open_in_memory().unwrap();
    let log = InMemoryBackend::new();
    db.create_bucket_with_backend("b", Box::new(log.clone()))
        .unwrap();
    db.update("b", |tx| {
        tx.create_index("n", IndexRule::int("n"))?;
        tx.set(Entry::new("a", json(1)))?;
        Ok(())
    })
    .unwrap();
    let committed = log.bytes();

    log.fail_writes(true);
    let result = db.update("b", |tx| {
        tx.set(Entry::new("a", json(2)))?;
        tx.set(Entry::new("b", json(3)))?;
        tx.drop_index("n")?;
        Ok(())
    });
    log.fail_writes(false);

    assert!(matches!(result, Err(CoreError::DurabilityFailure { .. })));
    assert_eq!(log.bytes(), committed);

    db.view("b", |tx| {
        assert_eq!(tx.get("a")?.unwrap().value().as_ref(), json(1).as_bytes());
        assert!(tx.get("b")?.is_none());
        assert_eq!(tx.indexes()?, vec!["n"]);
        tx.verify_indexes()
    })
    .unwrap();

    // The bucket is usable again once the backend recovers.
    db.update("b", |tx| tx.set(Entry::new("b", json(3))).map(|_| ()))
        .unwrap();
}

#[test]
fn entry_metadata_survives_encoding() {
    let db = Database::open_in_memory().unwrap();
    let bucket = db.create_bucket("b").unwrap();
    db.update("b", |tx| {
        tx.set(Entry::new("ttl", "v").with_ttl(Duration::from_secs(600)))?;
        Ok(())
    })
    .unwrap();

    let logged = bucket
        .read_log()
        .unwrap()
        .into_iter()
        .find_map(|r| r.to_entry())
        .unwrap();
    assert_eq!(logged.key(), "ttl");
    assert!(logged.is_valid());
    assert!(logged.expires_at().is_some());
}

#[test]
fn every_sync_policy_commits() {
    for policy in [
        SyncPolicy::Always,
        SyncPolicy::Interval(Duration::from_millis(1)),
        SyncPolicy::Never,
    ] {
        let temp = tempdir().unwrap();
        let db = Database::open_with_config(temp.path(), Config::new().sync_policy(policy))
            .unwrap();
        db.create_bucket("b").unwrap();
        db.update("b", |tx| tx.set(Entry::new("k", "v")).map(|_| ()))
            .unwrap();
        db.close().unwrap();

        assert_eq!(records_in(&temp.path().join("b.log")).len(), 3);
    }
}

#[test]
fn directory_is_exclusive_while_open() {
    let temp = tempdir().unwrap();
    let first = Database::open(temp.path()).unwrap();
    assert!(matches!(
        Database::open(temp.path()),
        Err(CoreError::DatabaseLocked)
    ));
    drop(first);
    Database::open(temp.path()).unwrap();
}
