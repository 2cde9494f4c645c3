//! # rentx-client
//!
//! Offline-first local cache and synchronization client for RentX.
//!
//! ## Features
//!
//! - **Local Store**: SQLite-backed record collections that survive restarts
//! - **Remote Gateway**: pluggable HTTP contract (reqwest, mock)
//! - **Connectivity Monitor**: tri-state reachability signal gating remote calls
//! - **Synchronizer**: pull/apply/push/commit cycle driven by the rentx-core
//!   state machine, at most one cycle in flight
//! - **Catalog**: the read API screens use; never touches sync internals
//!
//! ## Example
//!
//! ```ignore
//! use rentx_client::{Config, ConnectivityMonitor, RentxClient};
//! use rentx_core::Connectivity;
//!
//! let monitor = ConnectivityMonitor::new();
//! let client = RentxClient::open(&Config::default(), data_dir, monitor.clone()).await?;
//!
//! // Cache-first read, works offline
//! let cars = client.catalog().cars().await?;
//!
//! // Platform reports reachability; sync when connected
//! monitor.report(Connectivity::Connected);
//! client.synchronizer().sync_now().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod gateway;
pub mod store;
pub mod sync;

pub use catalog::{CarDetails, Catalog};
pub use client::{RentxClient, StatusReport};
pub use config::{Config, ConfigError};
pub use connectivity::ConnectivityMonitor;
pub use error::{CatalogError, ClientError, CycleError, StorageError};
pub use gateway::{GatewayCall, GatewayError, HttpGateway, MockGateway, RemoteGateway};
pub use store::{ApplyOutcome, LocalStore, LocalStoreExt, SqliteStore};
pub use sync::{CycleReport, CycleSummary, PushOutcome, SyncOptions, Synchronizer};
