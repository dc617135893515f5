//! Transaction bookkeeping.

use crate::bucket::BucketState;
use crate::entry::Entry;
use crate::index::Index;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Holding its lock and accepting operations.
    Active,
    /// Committed; the lock is released.
    Committed,
    /// Rolled back; the lock is released.
    RolledBack,
}

impl TxState {
    /// Returns true while the transaction can still be used.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Changes made by one read-write transaction.
///
/// `backward` holds, per touched key, the value the key had before the
/// transaction first touched it (`None` when absent). Later touches never
/// overwrite it. `forward` holds the latest value per key and is ordered so
/// commit writes records deterministically. `index_backward` holds, per
/// touched index name, the index as it was before the first change
/// (`None` when the index did not exist).
#[derive(Debug, Default)]
pub(crate) struct ChangeSet {
    backward: HashMap<String, Option<Arc<Entry>>>,
    forward: BTreeMap<String, Option<Arc<Entry>>>,
    index_backward: HashMap<String, Option<Index>>,
}

impl ChangeSet {
    /// Records that `key` went from `before` to `after`.
    pub(crate) fn record(
        &mut self,
        key: &str,
        before: Option<Arc<Entry>>,
        after: Option<Arc<Entry>>,
    ) {
        if !self.backward.contains_key(key) {
            self.backward.insert(key.to_owned(), before);
        }
        self.forward.insert(key.to_owned(), after);
    }

    /// Records that index `name` is about to change from `before`.
    pub(crate) fn record_index(&mut self, name: &str, before: Option<Index>) {
        if !self.index_backward.contains_key(name) {
            self.index_backward.insert(name.to_owned(), before);
        }
    }

    /// The net effect in key order.
    ///
    /// Keys that were absent before the transaction and are absent again
    /// after it are skipped.
    pub(crate) fn net_effect(&self) -> impl Iterator<Item = (&str, Option<&Arc<Entry>>)> {
        self.forward.iter().filter_map(|(key, after)| {
            let was_absent = matches!(self.backward.get(key), Some(None));
            if after.is_none() && was_absent {
                None
            } else {
                Some((key.as_str(), after.as_ref()))
            }
        })
    }

    /// Number of distinct keys touched.
    pub(crate) fn len(&self) -> usize {
        self.forward.len()
    }

    #[cfg(test)]
    pub(crate) fn before(&self, key: &str) -> Option<&Option<Arc<Entry>>> {
        self.backward.get(key)
    }

    /// Puts `state` back the way it was before the first recorded change.
    ///
    /// The index registry goes first, so a reinstated index is already
    /// registered when the data pass walks it. Restoring a key then fixes
    /// its slot in every registered index, which also clears entries a
    /// reinstated index picked up while it was in the transaction.
    pub(crate) fn undo(self, state: &mut BucketState) {
        for (name, before) in self.index_backward {
            match before {
                Some(index) => {
                    state.indexes.insert(name, index);
                }
                None => {
                    state.indexes.remove(&name);
                }
            }
        }
        for (key, before) in self.backward {
            state.restore(&key, before);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexRule;

    fn entry(key: &str, value: &str) -> Arc<Entry> {
        Arc::new(Entry::new(key.to_owned(), value.to_owned()))
    }

    #[test]
    fn backward_keeps_first_touch() {
        let original = entry("k", "0");
        let mut changes = ChangeSet::default();
        changes.record("k", Some(Arc::clone(&original)), Some(entry("k", "1")));
        changes.record("k", Some(entry("k", "1")), Some(entry("k", "2")));

        let before = changes.before("k").unwrap().as_ref().unwrap();
        assert!(Arc::ptr_eq(before, &original));
        let (_, after) = changes.net_effect().next().unwrap();
        assert_eq!(after.unwrap().value().as_ref(), b"2");
    }

    #[test]
    fn net_effect_skips_created_then_deleted() {
        let mut changes = ChangeSet::default();
        changes.record("new", None, Some(entry("new", "x")));
        changes.record("new", Some(entry("new", "x")), None);
        changes.record("old", Some(entry("old", "y")), None);

        let keys: Vec<_> = changes.net_effect().map(|(k, v)| (k, v.is_some())).collect();
        assert_eq!(keys, vec![("old", false)]);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn undo_restores_data_and_indexes() {
        let mut state = BucketState::default();
        let original = entry("a", r#"{"n":1}"#);
        state.put(Arc::clone(&original));

        let mut changes = ChangeSet::default();

        let mut index = Index::new("n", IndexRule::int("n"));
        index.build(state.primary.values());
        changes.record_index("n", None);
        state.indexes.insert("n".into(), index);

        let replacement = entry("a", r#"{"n":9}"#);
        let before = state.put(Arc::clone(&replacement));
        changes.record("a", before, Some(replacement));

        let added = entry("b", r#"{"n":2}"#);
        let before = state.put(Arc::clone(&added));
        changes.record("b", before, Some(added));

        changes.undo(&mut state);

        assert!(state.indexes.is_empty());
        assert_eq!(state.primary.len(), 1);
        assert!(Arc::ptr_eq(&state.primary["a"], &original));
    }

    #[test]
    fn undo_reinstates_dropped_index_without_new_entries() {
        let mut state = BucketState::default();
        state.indexes.insert("n".into(), Index::new("n", IndexRule::int("n")));
        state.put(entry("a", r#"{"n":1}"#));

        let mut changes = ChangeSet::default();
        let dropped = state.indexes.remove("n");
        changes.record_index("n", dropped);

        let added = entry("b", r#"{"n":2}"#);
        let before = state.put(Arc::clone(&added));
        changes.record("b", before, Some(added));

        changes.undo(&mut state);

        assert_eq!(state.indexes["n"].len(), 1);
        state.verify().unwrap();
    }
}
