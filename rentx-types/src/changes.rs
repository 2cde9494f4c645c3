//! Pull/push wire format.
//!
//! Mirrors the server's sync contract:
//! `{ changes: { <collection>: { created, updated, deleted } }, latestVersion }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use crate::records::record_id;
use crate::{Checkpoint, RecordError, RecordId};

/// Created/updated/deleted records for one collection.
///
/// `created` and `updated` are applied with upsert semantics, so the split
/// between them carries no meaning for the local store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Records the server reports as new.
    #[serde(default)]
    pub created: Vec<Value>,
    /// Records the server reports as changed.
    #[serde(default)]
    pub updated: Vec<Value>,
    /// Ids of removed records.
    #[serde(default)]
    pub deleted: Vec<RecordId>,
}

impl ChangeSet {
    /// Create an empty changeset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the changeset carries no changes.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// Records to upsert: `created` then `updated`.
    pub fn upserts(&self) -> impl Iterator<Item = &Value> {
        self.created.iter().chain(self.updated.iter())
    }

    /// Every id this changeset touches.
    ///
    /// Fails if any upserted record lacks an id.
    pub fn touched_ids(&self) -> Result<BTreeSet<RecordId>, RecordError> {
        let mut ids = BTreeSet::new();
        for value in self.upserts() {
            ids.insert(record_id(value)?);
        }
        ids.extend(self.deleted.iter().cloned());
        Ok(ids)
    }
}

/// Changesets keyed by collection name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Changes(BTreeMap<String, ChangeSet>);

impl Changes {
    /// Create an empty set of changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the changeset for `collection`.
    pub fn insert(&mut self, collection: impl Into<String>, changes: ChangeSet) {
        self.0.insert(collection.into(), changes);
    }

    /// Builder form of [`Changes::insert`].
    pub fn with(mut self, collection: impl Into<String>, changes: ChangeSet) -> Self {
        self.insert(collection, changes);
        self
    }

    /// Changeset for `collection`, if present.
    pub fn get(&self, collection: &str) -> Option<&ChangeSet> {
        self.0.get(collection)
    }

    /// Mutable changeset for `collection`, created empty if absent.
    pub fn entry(&mut self, collection: &str) -> &mut ChangeSet {
        self.0.entry(collection.to_string()).or_default()
    }

    /// Iterate over `(collection, changeset)` pairs in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, ChangeSet> {
        self.0.iter()
    }

    /// Whether no collection carries any change.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(ChangeSet::is_empty)
    }

    /// Total number of entries across collections.
    pub fn len(&self) -> usize {
        self.0.values().map(ChangeSet::len).sum()
    }
}

impl<'a> IntoIterator for &'a Changes {
    type Item = (&'a String, &'a ChangeSet);
    type IntoIter = btree_map::Iter<'a, String, ChangeSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Response to `GET /cars/sync/pull`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Changes since the requested checkpoint.
    #[serde(default)]
    pub changes: Changes,
    /// Version through which `changes` bring the client up to date.
    #[serde(rename = "latestVersion")]
    pub latest_version: Checkpoint,
}
