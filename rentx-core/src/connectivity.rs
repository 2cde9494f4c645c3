//! Tri-state network reachability.
//!
//! The platform reports reachability; this module only decides what a
//! reading means for gated operations. `Unknown` is the initial, still
//! measuring state and never counts as connected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current network reachability as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Network reachable.
    Connected,
    /// Network unreachable.
    Disconnected,
    /// Not measured yet.
    #[default]
    Unknown,
}

impl Connectivity {
    /// Map a platform reading where `None` means "not determined yet".
    pub fn from_reachability(reachable: Option<bool>) -> Self {
        match reachable {
            Some(true) => Self::Connected,
            Some(false) => Self::Disconnected,
            None => Self::Unknown,
        }
    }

    /// Whether remote calls may be issued. Only an explicit `Connected` qualifies.
    pub fn allows_remote(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}
