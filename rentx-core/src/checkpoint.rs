//! Checkpoint tracking for the sync cycle.
//!
//! The checkpoint is the server-assigned `latestVersion` through which the
//! local store is known consistent. It only ever moves forward; a server
//! reporting an older version than the stored one leaves it in place.

use rentx_types::Checkpoint;

/// The checkpoint to persist after a pull from `since` returned `latest`.
pub fn next_checkpoint(since: Option<Checkpoint>, latest: Checkpoint) -> Checkpoint {
    match since {
        Some(current) => current.max(latest),
        None => latest,
    }
}

/// In-memory view of the durable checkpoint.
///
/// Initialized from the persisted value on startup; advanced only after the
/// store has durably recorded the new value.
#[derive(Debug, Clone, Default)]
pub struct CheckpointTracker {
    current: Option<Checkpoint>,
}

impl CheckpointTracker {
    /// Create a tracker for a client that has never synced.
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Create a tracker resuming from a persisted checkpoint.
    pub fn with_checkpoint(checkpoint: Option<Checkpoint>) -> Self {
        Self {
            current: checkpoint,
        }
    }

    /// Last committed checkpoint, `None` before the first successful cycle.
    pub fn current(&self) -> Option<Checkpoint> {
        self.current
    }

    /// Record a committed checkpoint.
    ///
    /// Returns `true` if the tracked value moved forward.
    pub fn advance(&mut self, committed: Checkpoint) -> bool {
        let next = next_checkpoint(self.current, committed);
        let moved = self.current != Some(next);
        self.current = Some(next);
        moved
    }

    /// Forget the checkpoint (explicit application reset).
    pub fn reset(&mut self) {
        self.current = None;
    }
}
