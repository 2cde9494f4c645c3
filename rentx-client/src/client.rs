//! RentxClient - the application-facing entry point.
//!
//! Owns the process-wide sync context: one local store, one gateway, one
//! connectivity monitor and one synchronizer, wired together on startup.
//!
//! # Example
//!
//! ```ignore
//! let monitor = ConnectivityMonitor::new();
//! let client = RentxClient::open(&config, &data_dir, monitor.clone()).await?;
//!
//! let cars = client.catalog().cars().await?;
//! monitor.report(Connectivity::Connected);
//! client.synchronizer().sync_now().await?;
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rentx_core::{Connectivity, SyncPhase};
use rentx_types::Checkpoint;
use tracing::info;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{ClientError, StorageError};
use crate::gateway::{HttpGateway, RemoteGateway};
use crate::store::{LocalStore, SqliteStore};
use crate::sync::{SyncOptions, Synchronizer};

/// Snapshot of local sync state.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Last committed checkpoint, `None` if never synced.
    pub checkpoint: Option<Checkpoint>,
    /// Record counts per collection.
    pub counts: BTreeMap<String, u64>,
    /// Local mutations waiting to be pushed.
    pub pending: usize,
    /// Current connectivity reading.
    pub connectivity: Connectivity,
    /// Current cycle phase.
    pub phase: SyncPhase,
}

/// Offline-first RentX client.
pub struct RentxClient<G = HttpGateway> {
    store: Arc<SqliteStore>,
    monitor: ConnectivityMonitor,
    catalog: Catalog<SqliteStore, G>,
    synchronizer: Arc<Synchronizer<SqliteStore, G>>,
}

impl RentxClient<HttpGateway> {
    /// Open the client with an HTTP gateway, creating `data_dir` if needed.
    pub async fn open(
        config: &Config,
        data_dir: &Path,
        monitor: ConnectivityMonitor,
    ) -> Result<Self, ClientError> {
        std::fs::create_dir_all(data_dir).map_err(|e| ClientError::DataDir {
            path: data_dir.to_path_buf(),
            source: e,
        })?;

        let database = config.storage.database_path(data_dir);
        let store = SqliteStore::open(&database).await?;
        let gateway = HttpGateway::from_config(&config.remote)?;
        info!(database = %database.display(), remote = %gateway.base_url(), "client opened");

        Self::with_gateway(store, gateway, monitor, SyncOptions::from(&config.sync)).await
    }
}

impl<G: RemoteGateway> RentxClient<G> {
    /// Assemble a client from an opened store and any gateway.
    pub async fn with_gateway(
        store: SqliteStore,
        gateway: G,
        monitor: ConnectivityMonitor,
        options: SyncOptions,
    ) -> Result<Self, ClientError> {
        let store = Arc::new(store);
        let gateway = Arc::new(gateway);

        let synchronizer = Synchronizer::open(
            Arc::clone(&store),
            Arc::clone(&gateway),
            monitor.clone(),
            options,
        )
        .await?;
        let catalog = Catalog::new(Arc::clone(&store), gateway, monitor.clone());

        Ok(Self {
            store,
            monitor,
            catalog,
            synchronizer: Arc::new(synchronizer),
        })
    }

    /// Read API for screens.
    pub fn catalog(&self) -> &Catalog<SqliteStore, G> {
        &self.catalog
    }

    /// The synchronizer, shareable with a background task.
    pub fn synchronizer(&self) -> &Arc<Synchronizer<SqliteStore, G>> {
        &self.synchronizer
    }

    /// The connectivity monitor.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Current local sync state.
    pub async fn status(&self) -> Result<StatusReport, StorageError> {
        Ok(StatusReport {
            checkpoint: self.store.read_checkpoint().await?,
            counts: self.store.counts().await?,
            pending: self.store.pending_mutations().await?.len(),
            connectivity: self.monitor.current(),
            phase: self.synchronizer.phase(),
        })
    }

    /// Wipe all local data. The next sync starts from scratch.
    pub async fn reset(&self) -> Result<(), StorageError> {
        self.synchronizer.reset().await
    }
}
