//! SQLite store backend for rentx-client.

use super::{ApplyOutcome, LocalStore};
use crate::error::StorageError;
use async_trait::async_trait;
use rentx_core::{superseded_by, MutationKind, PendingMutation};
use rentx_types::{collections, record_id, ChangeSet, Changes, Checkpoint, RecordId};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const CHECKPOINT_KEY: &str = "last_pulled_at";

/// SQLite-based local store.
///
/// Uses WAL mode so readers are not blocked by a sync transaction.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let url = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(url)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // A single connection that never expires: the database lives in it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_state (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_mutations (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                mutation_id TEXT NOT NULL UNIQUE,
                collection TEXT NOT NULL,
                record_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                body TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_pending_record ON pending_mutations(collection, record_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn ensure_writable(collection: &str) -> Result<(), StorageError> {
        if collections::is_client_writable(collection) {
            Ok(())
        } else {
            Err(StorageError::ReadOnlyCollection {
                collection: collection.to_string(),
            })
        }
    }
}

/// Upsert/delete one changeset on an open transaction.
///
/// Stops at the first bad record; the caller's transaction is then dropped,
/// which rolls back everything written so far.
async fn apply_in(
    conn: &mut SqliteConnection,
    collection: &str,
    changes: &ChangeSet,
) -> Result<usize, StorageError> {
    let now = SqliteStore::current_timestamp();
    let mut applied = 0;

    for value in changes.upserts() {
        let id = record_id(value)?;
        upsert_in(conn, collection, &id, value, now).await?;
        applied += 1;
    }

    for id in &changes.deleted {
        sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id.as_str())
            .execute(&mut *conn)
            .await?;
        applied += 1;
    }

    Ok(applied)
}

async fn upsert_in(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &RecordId,
    value: &Value,
    now: i64,
) -> Result<(), StorageError> {
    let body = serde_json::to_string(value)?;
    sqlx::query(
        r#"
        INSERT INTO records (collection, id, body, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
        "#,
    )
    .bind(collection)
    .bind(id.as_str())
    .bind(body)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_checkpoint_in(
    conn: &mut SqliteConnection,
    checkpoint: Checkpoint,
) -> Result<(), StorageError> {
    let value = i64::try_from(checkpoint.value()).map_err(|_| {
        StorageError::Corrupt(format!("checkpoint {} exceeds storage range", checkpoint))
    })?;
    sqlx::query(
        r#"
        INSERT INTO sync_state (key, value) VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = MAX(value, excluded.value)
        "#,
    )
    .bind(CHECKPOINT_KEY)
    .bind(value)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_pending_in(
    conn: &mut SqliteConnection,
    mutation: &PendingMutation,
) -> Result<(), StorageError> {
    let body = match &mutation.record {
        Some(value) => Some(serde_json::to_string(value)?),
        None => None,
    };
    sqlx::query(
        r#"
        INSERT INTO pending_mutations (mutation_id, collection, record_id, kind, body, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(mutation.mutation_id.to_string())
    .bind(&mutation.collection)
    .bind(mutation.record_id.as_str())
    .bind(mutation.kind.as_str())
    .bind(body)
    .bind(SqliteStore::current_timestamp())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn delete_pending_in(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<(), StorageError> {
    for id in ids {
        sqlx::query("DELETE FROM pending_mutations WHERE mutation_id = ?1")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn load_pending_in(conn: &mut SqliteConnection) -> Result<Vec<PendingMutation>, StorageError> {
    let rows = sqlx::query_as::<_, PendingRow>(
        r#"
        SELECT mutation_id, collection, record_id, kind, body
        FROM pending_mutations
        ORDER BY seq ASC
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(PendingMutation::try_from).collect()
}

async fn exists_in(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &RecordId,
) -> Result<bool, StorageError> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM records WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id.as_str())
            .fetch_optional(&mut *conn)
            .await?;
    Ok(found.is_some())
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Value>, StorageError> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ?1 AND id = ?2")
                .bind(collection)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn query(&self, collection: &str) -> Result<Vec<Value>, StorageError> {
        let bodies: Vec<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ?1 ORDER BY id ASC")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StorageError::from))
            .collect()
    }

    async fn apply_change_set(
        &self,
        collection: &str,
        changes: &ChangeSet,
    ) -> Result<usize, StorageError> {
        let mut tx = self.pool.begin().await?;
        let applied = apply_in(&mut tx, collection, changes).await?;
        tx.commit().await?;
        Ok(applied)
    }

    async fn apply_pull(&self, changes: &Changes) -> Result<ApplyOutcome, StorageError> {
        let mut tx = self.pool.begin().await?;

        let mut applied = 0;
        for (collection, set) in changes {
            applied += apply_in(&mut tx, collection, set).await?;
        }

        // Server wins over unpushed local edits of the same record.
        let pending = load_pending_in(&mut tx).await?;
        let superseded = superseded_by(&pending, changes)?;
        delete_pending_in(&mut tx, &superseded).await?;

        tx.commit().await?;
        Ok(ApplyOutcome {
            applied,
            superseded: superseded.len(),
        })
    }

    async fn read_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM sync_state WHERE key = ?1")
            .bind(CHECKPOINT_KEY)
            .fetch_optional(&self.pool)
            .await?;

        value
            .map(|v| {
                u64::try_from(v)
                    .map(Checkpoint::new)
                    .map_err(|_| StorageError::Corrupt(format!("negative checkpoint {}", v)))
            })
            .transpose()
    }

    async fn write_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        write_checkpoint_in(&mut conn, checkpoint).await
    }

    async fn commit(&self, checkpoint: Checkpoint, pushed: &[Uuid]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        delete_pending_in(&mut tx, pushed).await?;
        write_checkpoint_in(&mut tx, checkpoint).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_local_change(
        &self,
        collection: &str,
        record: Value,
    ) -> Result<PendingMutation, StorageError> {
        Self::ensure_writable(collection)?;
        let id = record_id(&record)?;

        let mut tx = self.pool.begin().await?;
        let kind = if exists_in(&mut tx, collection, &id).await? {
            MutationKind::Updated
        } else {
            MutationKind::Created
        };
        upsert_in(&mut tx, collection, &id, &record, Self::current_timestamp()).await?;
        let mutation = PendingMutation::upsert(collection, kind, record)?;
        insert_pending_in(&mut tx, &mutation).await?;
        tx.commit().await?;

        Ok(mutation)
    }

    async fn record_local_delete(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> Result<Option<PendingMutation>, StorageError> {
        Self::ensure_writable(collection)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let mutation = PendingMutation::delete(collection, id.clone());
        insert_pending_in(&mut tx, &mutation).await?;
        tx.commit().await?;
        Ok(Some(mutation))
    }

    async fn pending_mutations(&self) -> Result<Vec<PendingMutation>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        load_pending_in(&mut conn).await
    }

    async fn counts(&self) -> Result<BTreeMap<String, u64>, StorageError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT collection, COUNT(*) FROM records GROUP BY collection")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(collection, count)| (collection, count.max(0) as u64))
            .collect())
    }

    async fn reset(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for table in ["records", "pending_mutations", "sync_state"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Internal row type for pending-mutation queries.
#[derive(sqlx::FromRow)]
struct PendingRow {
    mutation_id: String,
    collection: String,
    record_id: String,
    kind: String,
    body: Option<String>,
}

impl TryFrom<PendingRow> for PendingMutation {
    type Error = StorageError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        let mutation_id = Uuid::parse_str(&row.mutation_id)
            .map_err(|_| StorageError::Corrupt(format!("bad mutation id {}", row.mutation_id)))?;
        let kind = MutationKind::parse(&row.kind)
            .ok_or_else(|| StorageError::Corrupt(format!("bad mutation kind {}", row.kind)))?;
        let record = match row.body {
            Some(body) => Some(serde_json::from_str(&body)?),
            None => None,
        };

        Ok(PendingMutation {
            mutation_id,
            collection: row.collection,
            record_id: RecordId::new(row.record_id),
            kind,
            record,
        })
    }
}
