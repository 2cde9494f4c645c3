//! Local store for rentx-client.
//!
//! Schema-typed record collections, the durable sync checkpoint and the
//! pending-mutation log, all queryable without network access.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StorageError;
use async_trait::async_trait;
use rentx_core::PendingMutation;
use rentx_types::{ChangeSet, Changes, Checkpoint, Record, RecordId};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

/// Result of applying one pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Changeset entries applied (upserts plus deletes).
    pub applied: usize,
    /// Pending mutations discarded because the pull touched their record.
    pub superseded: usize,
}

/// Trait for local store backends.
///
/// Transactions are serialized internally; callers never lock. Readers see
/// either the state before or after a changeset, never part of one.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Get a record by id.
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Value>, StorageError>;

    /// All records of a collection, ordered by id.
    async fn query(&self, collection: &str) -> Result<Vec<Value>, StorageError>;

    /// Apply one collection's changeset in a single transaction.
    ///
    /// Creates and updates are upserts keyed by id; deleting an absent id
    /// is a no-op. Returns the number of entries applied.
    async fn apply_change_set(
        &self,
        collection: &str,
        changes: &ChangeSet,
    ) -> Result<usize, StorageError>;

    /// Apply every collection of a pull in a single transaction, discarding
    /// pending mutations for any record the pull touches.
    async fn apply_pull(&self, changes: &Changes) -> Result<ApplyOutcome, StorageError>;

    /// Read the durable checkpoint, `None` if never synced.
    async fn read_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError>;

    /// Write the checkpoint. A lower value than the stored one is ignored.
    async fn write_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), StorageError>;

    /// Clear pushed mutations and write the checkpoint in one transaction.
    async fn commit(&self, checkpoint: Checkpoint, pushed: &[Uuid]) -> Result<(), StorageError>;

    /// Upsert a record in a client-writable collection and queue it for push.
    async fn record_local_change(
        &self,
        collection: &str,
        record: Value,
    ) -> Result<PendingMutation, StorageError>;

    /// Delete a record in a client-writable collection and queue the delete.
    ///
    /// Returns `None` if the record did not exist.
    async fn record_local_delete(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> Result<Option<PendingMutation>, StorageError>;

    /// Pending mutations, oldest first.
    async fn pending_mutations(&self) -> Result<Vec<PendingMutation>, StorageError>;

    /// Record counts per collection.
    async fn counts(&self) -> Result<BTreeMap<String, u64>, StorageError>;

    /// Wipe records, pending mutations and the checkpoint.
    async fn reset(&self) -> Result<(), StorageError>;
}

/// Typed access on top of [`LocalStore`].
#[async_trait]
pub trait LocalStoreExt: LocalStore {
    /// Get a typed record by id.
    async fn fetch<R>(&self, id: &RecordId) -> Result<Option<R>, StorageError>
    where
        R: Record + Send,
    {
        match self.get(R::COLLECTION, id).await? {
            Some(value) => Ok(Some(R::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Typed records of a collection matching `predicate`.
    async fn fetch_where<R, P>(&self, predicate: P) -> Result<Vec<R>, StorageError>
    where
        R: Record + Send,
        P: Fn(&R) -> bool + Send + Sync,
    {
        let mut records = Vec::new();
        for value in self.query(R::COLLECTION).await? {
            let record = R::from_value(value)?;
            if predicate(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// All typed records of a collection, skipping rows that do not decode.
    ///
    /// A pulled record the schema rejects stays stored but is left out of
    /// the listing, so one bad row never hides the rest.
    async fn fetch_readable<R>(&self) -> Result<Vec<R>, StorageError>
    where
        R: Record + Send,
    {
        let mut records = Vec::new();
        for value in self.query(R::COLLECTION).await? {
            let id = value.get("id").cloned().unwrap_or(Value::Null);
            match R::from_value(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(collection = R::COLLECTION, %id, error = %e, "skipping unreadable record")
                }
            }
        }
        Ok(records)
    }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}
