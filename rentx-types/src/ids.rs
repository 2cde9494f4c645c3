//! Identity and ordering types for RentX.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Collection names known to the client.
pub mod collections {
    /// Car catalog. Replaced only by sync.
    pub const CARS: &str = "cars";
    /// Completed bookings. Created server-side.
    pub const RENTALS: &str = "rentals";
    /// User profile. The only collection the client writes to.
    pub const USERS: &str = "users";

    /// Whether local mutations may originate on the client for `collection`.
    pub fn is_client_writable(collection: &str) -> bool {
        collection == USERS
    }
}

/// Identifier of a record within its collection.
///
/// Server-assigned strings; the client never mints ids for catalog data.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a RecordId from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

/// A monotonically non-decreasing sync checkpoint (`lastPulledAt`).
///
/// Assigned by the server as `latestVersion`, never by the client.
/// "Never synced" is represented as `Option<Checkpoint>::None`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Checkpoint(u64);

impl Checkpoint {
    /// Create a new Checkpoint with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Checkpoint.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The checkpoint a never-synced client pulls from.
    pub fn zero() -> Self {
        Self(0)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoint({})", self.0)
    }
}
