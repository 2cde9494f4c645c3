//! Pending local mutations for RentX.
//!
//! Local writes (user profile edits) are recorded as mutations and held
//! until the server acknowledges a push. This module provides:
//! - Coalescing of a mutation log into one push payload per cycle
//! - Detection of mutations superseded by a pull (the server wins)
//!
//! Mutations flow through the client in this order:
//! 1. recorded locally alongside the store write
//! 2. coalesced into a [`PushBatch`] when a cycle reaches `Pushing`
//! 3. cleared by id once the push succeeds, retained otherwise

use rentx_types::{record_id, Changes, RecordError, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Kind of a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    /// Record did not exist locally.
    Created,
    /// Record replaced an existing one.
    Updated,
    /// Record removed.
    Deleted,
}

impl MutationKind {
    /// Stable name used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }

    /// Parse a persisted name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// A local write not yet acknowledged by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    /// Unique identifier, used to clear the mutation after a push.
    pub mutation_id: Uuid,
    /// Collection the record belongs to.
    pub collection: String,
    /// Record the mutation applies to.
    pub record_id: RecordId,
    /// What happened to the record.
    pub kind: MutationKind,
    /// Full record for creates and updates, `None` for deletes.
    pub record: Option<Value>,
}

impl PendingMutation {
    /// A create or update carrying the full record.
    ///
    /// Fails if the record has no id.
    pub fn upsert(
        collection: &str,
        kind: MutationKind,
        record: Value,
    ) -> Result<Self, RecordError> {
        let record_id = record_id(&record)?;
        Ok(Self {
            mutation_id: Uuid::new_v4(),
            collection: collection.to_string(),
            record_id,
            kind,
            record: Some(record),
        })
    }

    /// A delete of `record_id`.
    pub fn delete(collection: &str, record_id: RecordId) -> Self {
        Self {
            mutation_id: Uuid::new_v4(),
            collection: collection.to_string(),
            record_id,
            kind: MutationKind::Deleted,
            record: None,
        }
    }
}

/// Net effect of several mutations on one record.
#[derive(Debug, Clone)]
enum Net {
    Created(Value),
    Updated(Value),
    Deleted,
    Nothing,
}

impl Net {
    fn then(self, kind: MutationKind, record: Option<Value>) -> Self {
        let value = record.unwrap_or(Value::Null);
        match (self, kind) {
            (_, MutationKind::Deleted) => Self::Deleted,
            (Self::Created(_), _) | (Self::Nothing, MutationKind::Created) => {
                Self::Created(value)
            }
            // Recreated after a delete: the server still has it.
            (Self::Nothing, MutationKind::Updated) | (Self::Deleted, _) | (Self::Updated(_), _) => {
                Self::Updated(value)
            }
        }
    }

    fn start(kind: MutationKind, record: Option<Value>) -> Self {
        Self::Nothing.then(kind, record)
    }
}

/// Coalesced push payload for one cycle.
///
/// Later mutations of the same record override earlier ones, and a record
/// created and deleted before any push never reaches the server.
#[derive(Debug, Clone, Default)]
pub struct PushBatch {
    changes: Changes,
    mutation_ids: Vec<Uuid>,
}

impl PushBatch {
    /// Coalesce `mutations` (oldest first) into a push payload.
    pub fn build(mutations: &[PendingMutation]) -> Self {
        let mut net: BTreeMap<(String, RecordId), (Net, bool)> = BTreeMap::new();
        let mut mutation_ids = Vec::with_capacity(mutations.len());

        for m in mutations {
            mutation_ids.push(m.mutation_id);
            let key = (m.collection.clone(), m.record_id.clone());
            match net.remove(&key) {
                Some((prev, created_locally)) => {
                    let next = prev.then(m.kind, m.record.clone());
                    net.insert(key, (next, created_locally));
                }
                None => {
                    let created_locally = m.kind == MutationKind::Created;
                    net.insert(key, (Net::start(m.kind, m.record.clone()), created_locally));
                }
            }
        }

        let mut changes = Changes::new();
        for ((collection, id), (state, created_locally)) in net {
            let set = changes.entry(&collection);
            // A record first created in this batch is unknown to the server.
            match state {
                Net::Created(v) => set.created.push(v),
                Net::Updated(v) if created_locally => set.created.push(v),
                Net::Updated(v) => set.updated.push(v),
                Net::Deleted if created_locally => {}
                Net::Deleted => set.deleted.push(id),
                Net::Nothing => {}
            }
        }

        Self {
            changes,
            mutation_ids,
        }
    }

    /// The payload to push.
    pub fn changes(&self) -> &Changes {
        &self.changes
    }

    /// Every mutation folded into this batch; clear these after a successful push.
    pub fn mutation_ids(&self) -> &[Uuid] {
        &self.mutation_ids
    }

    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Mutations whose record is also touched by `pulled`.
///
/// The pulled (server) version wins, so these are discarded in the same
/// transaction that applies the pull.
pub fn superseded_by(
    pending: &[PendingMutation],
    pulled: &Changes,
) -> Result<Vec<Uuid>, RecordError> {
    let mut touched: BTreeMap<&str, BTreeSet<RecordId>> = BTreeMap::new();
    for (collection, set) in pulled {
        touched.insert(collection.as_str(), set.touched_ids()?);
    }

    Ok(pending
        .iter()
        .filter(|m| {
            touched
                .get(m.collection.as_str())
                .is_some_and(|ids| ids.contains(&m.record_id))
        })
        .map(|m| m.mutation_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentx_types::ChangeSet;
    use serde_json::json;

    fn upsert(kind: MutationKind, id: &str, name: &str) -> PendingMutation {
        PendingMutation::upsert("users", kind, json!({"id": id, "name": name})).unwrap()
    }

    #[test]
    fn upsert_requires_record_id() {
        let result = PendingMutation::upsert("users", MutationKind::Created, json!({"name": "x"}));
        assert!(matches!(result, Err(RecordError::MissingId)));
    }

    #[test]
    fn kind_roundtrips_through_name() {
        for kind in [MutationKind::Created, MutationKind::Updated, MutationKind::Deleted] {
            assert_eq!(MutationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MutationKind::parse("renamed"), None);
    }

    #[test]
    fn empty_log_builds_empty_batch() {
        let batch = PushBatch::build(&[]);
        assert!(batch.is_empty());
        assert!(batch.mutation_ids().is_empty());
    }

    #[test]
    fn latest_update_wins() {
        let log = vec![
            upsert(MutationKind::Updated, "u1", "Ana"),
            upsert(MutationKind::Updated, "u1", "Ana Maria"),
        ];
        let batch = PushBatch::build(&log);
        let users = batch.changes().get("users").unwrap();
        assert_eq!(users.updated.len(), 1);
        assert_eq!(users.updated[0]["name"], "Ana Maria");
        assert_eq!(batch.mutation_ids().len(), 2);
    }

    #[test]
    fn create_then_update_stays_create() {
        let log = vec![
            upsert(MutationKind::Created, "u1", "Ana"),
            upsert(MutationKind::Updated, "u1", "Bia"),
        ];
        let batch = PushBatch::build(&log);
        let users = batch.changes().get("users").unwrap();
        assert_eq!(users.created.len(), 1);
        assert!(users.updated.is_empty());
        assert_eq!(users.created[0]["name"], "Bia");
    }

    #[test]
    fn create_then_delete_never_reaches_server() {
        let log = vec![
            upsert(MutationKind::Created, "u1", "Ana"),
            PendingMutation::delete("users", "u1".into()),
        ];
        let batch = PushBatch::build(&log);
        assert!(batch.is_empty());
        // Both are still cleared after the (skipped) push.
        assert_eq!(batch.mutation_ids().len(), 2);
    }

    #[test]
    fn create_delete_create_is_still_a_create() {
        let log = vec![
            upsert(MutationKind::Created, "u1", "Ana"),
            PendingMutation::delete("users", "u1".into()),
            upsert(MutationKind::Created, "u1", "Bia"),
        ];
        let batch = PushBatch::build(&log);
        let users = batch.changes().get("users").unwrap();
        assert_eq!(users.created.len(), 1);
        assert!(users.updated.is_empty());
        assert!(users.deleted.is_empty());
    }

    #[test]
    fn update_then_delete_is_delete() {
        let log = vec![
            upsert(MutationKind::Updated, "u1", "Ana"),
            PendingMutation::delete("users", "u1".into()),
        ];
        let batch = PushBatch::build(&log);
        let users = batch.changes().get("users").unwrap();
        assert_eq!(users.deleted, vec![RecordId::from("u1")]);
        assert!(users.updated.is_empty());
    }

    #[test]
    fn delete_then_recreate_is_update() {
        let log = vec![
            PendingMutation::delete("users", "u1".into()),
            upsert(MutationKind::Created, "u1", "Ana"),
        ];
        let batch = PushBatch::build(&log);
        let users = batch.changes().get("users").unwrap();
        assert_eq!(users.updated.len(), 1);
        assert!(users.deleted.is_empty());
    }

    #[test]
    fn independent_records_are_kept_apart() {
        let log = vec![
            upsert(MutationKind::Updated, "u1", "Ana"),
            upsert(MutationKind::Created, "u2", "Bia"),
        ];
        let batch = PushBatch::build(&log);
        assert_eq!(batch.changes().len(), 2);
    }

    #[test]
    fn pulled_record_supersedes_pending_mutation() {
        let log = vec![
            upsert(MutationKind::Updated, "u1", "local"),
            upsert(MutationKind::Updated, "u2", "local"),
        ];
        let pulled = Changes::new().with(
            "users",
            ChangeSet {
                updated: vec![json!({"id": "u1", "name": "server"})],
                ..ChangeSet::default()
            },
        );

        let superseded = superseded_by(&log, &pulled).unwrap();
        assert_eq!(superseded, vec![log[0].mutation_id]);
    }

    #[test]
    fn pulled_delete_supersedes_pending_mutation() {
        let log = vec![upsert(MutationKind::Updated, "u1", "local")];
        let pulled = Changes::new().with(
            "users",
            ChangeSet {
                deleted: vec!["u1".into()],
                ..ChangeSet::default()
            },
        );
        assert_eq!(superseded_by(&log, &pulled).unwrap().len(), 1);
    }

    #[test]
    fn other_collections_do_not_supersede() {
        let log = vec![upsert(MutationKind::Updated, "c1", "local")];
        let pulled = Changes::new().with(
            "cars",
            ChangeSet {
                created: vec![json!({"id": "c1"})],
                ..ChangeSet::default()
            },
        );
        assert!(superseded_by(&log, &pulled).unwrap().is_empty());
    }
}
