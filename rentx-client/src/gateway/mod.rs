//! Remote gateway for RentX.
//!
//! This module abstracts the four calls the client makes to the backend
//! (reqwest over HTTP, mock for testing).
//!
//! # Design
//!
//! - `fetch_car_by_id()` and `fetch_rentals()` serve view-level refreshes
//! - `pull_changes_since()` and `push_local_changes()` serve the synchronizer
//!
//! Failures are classified so callers can tell a transient network problem
//! (retry later) from a server rejection (conflict) or a malformed response.
//!
//! # Example
//!
//! ```ignore
//! let gateway = MockGateway::new();
//! gateway.queue_pull(response);
//! let response = gateway.pull_changes_since(None).await?;
//! ```

mod http;
mod mock;

pub use http::HttpGateway;
pub use mock::{GatewayCall, MockGateway};

use async_trait::async_trait;
use rentx_types::{Car, Changes, Checkpoint, PullResponse, RecordId, Rental};
use thiserror::Error;

/// Gateway errors.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connection refused, reset, or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// The requested entity does not exist remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the payload.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body was not the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether retrying later may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Status { status, .. } => *status >= 500 || *status == 429,
            GatewayError::NotFound(_) | GatewayError::Conflict(_) | GatewayError::Decode(_) => {
                false
            }
        }
    }

    /// Whether the server rejected the request outright.
    pub fn is_conflict(&self) -> bool {
        matches!(self, GatewayError::Conflict(_))
    }
}

/// Remote gateway trait.
///
/// Implementations perform no retries; retry policy belongs to the
/// synchronizer.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch one car with full detail.
    async fn fetch_car_by_id(&self, id: &RecordId) -> Result<Car, GatewayError>;

    /// Fetch the user's rentals.
    async fn fetch_rentals(&self) -> Result<Vec<Rental>, GatewayError>;

    /// Pull changes after `since`; `None` means from the beginning.
    async fn pull_changes_since(
        &self,
        since: Option<Checkpoint>,
    ) -> Result<PullResponse, GatewayError>;

    /// Push local changes. Only the `users` collection is sent.
    async fn push_local_changes(&self, changes: &Changes) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GatewayError::Network("reset".into()).is_transient());
        assert!(GatewayError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!GatewayError::Status {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!GatewayError::Conflict("stale".into()).is_transient());
        assert!(!GatewayError::NotFound("c1".into()).is_transient());
        assert!(!GatewayError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn status_display() {
        let err = GatewayError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "server returned 500: boom");
    }
}
