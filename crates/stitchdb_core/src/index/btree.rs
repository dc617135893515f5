//! Ordered secondary index.

use crate::entry::Entry;
use crate::index::rule::{FieldKey, IndexRule};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A named secondary index over one bucket.
///
/// Entries are ordered by the field their [`IndexRule`] extracts, with ties
/// broken by primary key. The index stores `Arc` clones of the entries held
/// by the primary index, never copies.
///
/// A second map remembers the slot each primary key occupies, so removal is
/// exact by key alone. That matters during rollback, when a reinstated index
/// may still point at an entry the primary index has since replaced.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    rule: IndexRule,
    tree: BTreeMap<(FieldKey, String), Arc<Entry>>,
    slots: HashMap<String, FieldKey>,
}

impl Index {
    /// Creates an empty index.
    pub(crate) fn new(name: impl Into<String>, rule: IndexRule) -> Self {
        Self {
            name: name.into(),
            rule,
            tree: BTreeMap::new(),
            slots: HashMap::new(),
        }
    }

    /// Rebuilds the index from scratch over `entries`.
    ///
    /// Entries whose field is undefined are skipped.
    pub(crate) fn build<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = &'a Arc<Entry>>,
    {
        self.tree.clear();
        self.slots.clear();
        for entry in entries {
            self.upsert(entry);
        }
    }

    /// Places `entry` under its key, replacing whatever the key held.
    pub(crate) fn upsert(&mut self, entry: &Arc<Entry>) {
        self.remove(entry.key());
        if let Some(field) = self.rule.extract(entry.value()) {
            let key = entry.key().to_owned();
            self.slots.insert(key.clone(), field.clone());
            self.tree.insert((field, key), Arc::clone(entry));
        }
    }

    /// Removes whatever entry the index holds for `key`.
    pub(crate) fn remove(&mut self, key: &str) -> Option<Arc<Entry>> {
        let field = self.slots.remove(key)?;
        self.tree.remove(&(field, key.to_owned()))
    }

    /// Iterates entries in field order.
    pub(crate) fn entries(&self) -> impl DoubleEndedIterator<Item = &Arc<Entry>> {
        self.tree.values()
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the extraction rule.
    #[must_use]
    pub fn rule(&self) -> &IndexRule {
        &self.rule
    }

    /// Returns the field extracted for `key`, if the key is indexed.
    #[must_use]
    pub fn field_of(&self, key: &str) -> Option<&FieldKey> {
        self.slots.get(key)
    }

    /// Returns the entry indexed under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<Entry>> {
        let field = self.slots.get(key)?;
        self.tree.get(&(field.clone(), key.to_owned()))
    }

    /// Returns the number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
