//! Error types for rentx-client.

use std::path::PathBuf;

use rentx_types::RecordError;

use crate::gateway::GatewayError;

/// Local store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record could not be interpreted.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Local writes are not allowed for this collection.
    #[error("collection is read-only on the client: {collection}")]
    ReadOnlyCollection {
        /// The collection name.
        collection: String,
    },

    /// Persisted state is not in the expected shape.
    #[error("corrupt local state: {0}")]
    Corrupt(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Record(RecordError::Json(err))
    }
}

/// Why a sync cycle aborted to Idle.
///
/// Every variant leaves the store and checkpoint as they were before the
/// cycle started.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// Pulling changes failed.
    #[error("pull failed: {0}")]
    Pull(#[source] GatewayError),

    /// Applying pulled changes failed and was rolled back.
    #[error("apply failed: {0}")]
    Apply(#[source] StorageError),

    /// Writing the checkpoint failed.
    #[error("commit failed: {0}")]
    Commit(#[source] StorageError),

    /// The state machine stopped without a recorded failure.
    #[error("cycle stopped in phase {0}")]
    Interrupted(&'static str),
}

impl CycleError {
    /// Whether the failure is a transient network condition.
    pub fn is_network(&self) -> bool {
        matches!(self, CycleError::Pull(e) if e.is_transient())
    }
}

/// Read-path errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Local store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote gateway error.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Record could not be decoded.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Entity absent both locally and remotely.
    #[error("{collection} not found: {id}")]
    NotFound {
        /// Collection searched.
        collection: &'static str,
        /// The id that was not found.
        id: String,
    },
}

/// Client construction errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Gateway error.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The data directory could not be created.
    #[error("cannot create data directory {path}: {source}")]
    DataDir {
        /// The directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
