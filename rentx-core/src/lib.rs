//! # rentx-core
//!
//! Pure logic for the RentX sync core (no I/O, instant tests).
//!
//! This crate implements the sync-cycle state machine and the algorithms
//! around it without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (HTTP, SQLite) is performed by `rentx-client`, which
//! interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod connectivity;
pub mod pending;
pub mod retry;
pub mod state;

pub use checkpoint::{next_checkpoint, CheckpointTracker};
pub use connectivity::Connectivity;
pub use pending::{superseded_by, MutationKind, PendingMutation, PushBatch};
pub use retry::RetryPolicy;
pub use state::{Action, Event, SyncEvent, SyncPhase};
