//! # rentx-types
//!
//! Data model and wire format for the RentX offline-first sync core.
//!
//! This crate provides the foundational types used across all RentX crates:
//! - [`Car`], [`Rental`] - Catalog records served from the local store
//! - [`RecordId`], [`Checkpoint`] - Identity and ordering types
//! - [`ChangeSet`], [`Changes`], [`PullResponse`] - Pull/push wire format
//! - [`RecordError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod changes;
mod error;
mod ids;
mod records;

pub use changes::{ChangeSet, Changes, PullResponse};
pub use error::RecordError;
pub use ids::{collections, Checkpoint, RecordId};
pub use records::{parse_iso_date, record_id, Accessory, Car, Photo, Record, Rental};
