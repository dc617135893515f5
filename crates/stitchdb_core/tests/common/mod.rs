//! Shared helpers for integration tests.

#![allow(dead_code)]

use stitchdb_core::{Database, Tx};

/// `(key, value)` pairs of the live entries, in key order.
pub type Snapshot = Vec<(String, Vec<u8>)>;

pub fn memory_db(bucket: &str) -> Database {
    let db = Database::open_in_memory().unwrap();
    db.create_bucket(bucket).unwrap();
    db
}

pub fn primary(tx: &Tx) -> Snapshot {
    let mut out = Vec::new();
    tx.ascend(|e| {
        out.push((e.key().to_owned(), e.value().to_vec()));
        true
    })
    .unwrap();
    out
}

pub fn index_keys(tx: &Tx, name: &str) -> Vec<String> {
    let mut out = Vec::new();
    tx.ascend_index(name, |e| {
        out.push(e.key().to_owned());
        true
    })
    .unwrap();
    out
}

/// Primary contents plus the key order of every index.
pub fn full_state(tx: &Tx) -> (Snapshot, Vec<(String, Vec<String>)>) {
    let indexes = tx
        .indexes()
        .unwrap()
        .into_iter()
        .map(|name| {
            let keys = index_keys(tx, &name);
            (name, keys)
        })
        .collect();
    (primary(tx), indexes)
}

pub fn json(n: i64) -> String {
    format!(r#"{{"n":{n}}}"#)
}
