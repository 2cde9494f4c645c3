//! Sync-cycle state machine for RentX.
//!
//! This module provides a pure, side-effect-free state machine for one
//! pull/apply/push/commit cycle. The state machine takes events as input
//! and produces a new state plus a list of actions to execute.
//!
//! ```text
//! Idle → Pulling → Applying → Pushing → Committed
//!   ↑       │          │          │
//!   └───────┴──────────┴──────────┘  (any failure)
//! ```
//!
//! The actual I/O (HTTP calls, SQLite transactions) is performed by
//! rentx-client, not by this module.

use rentx_types::Checkpoint;

use crate::checkpoint::next_checkpoint;
use crate::connectivity::Connectivity;

/// Sync-cycle state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No cycle in flight.
    #[default]
    Idle,
    /// Waiting for the pull response.
    Pulling {
        /// Checkpoint the pull was issued from.
        since: Option<Checkpoint>,
    },
    /// Applying the pulled changes to the local store.
    Applying {
        /// Checkpoint the pull was issued from.
        since: Option<Checkpoint>,
        /// `latestVersion` reported by the pull.
        latest: Checkpoint,
    },
    /// Pushing pending local mutations, then committing the checkpoint.
    Pushing {
        /// Checkpoint to commit once the push settles.
        commit_to: Checkpoint,
    },
    /// Checkpoint durably written; the cycle succeeded.
    Committed {
        /// The committed checkpoint.
        checkpoint: Checkpoint,
    },
}

impl SyncPhase {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (rentx-client)
    /// is responsible for executing the returned actions and feeding their
    /// outcome back as the next event.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Idle (or a finished cycle)
            (
                Self::Idle | Self::Committed { .. },
                Event::SyncRequested {
                    connectivity,
                    checkpoint,
                },
            ) => {
                if connectivity.allows_remote() {
                    (
                        Self::Pulling { since: checkpoint },
                        vec![Action::Pull { since: checkpoint }],
                    )
                } else {
                    (
                        Self::Idle,
                        vec![Action::EmitEvent(SyncEvent::SkippedOffline { connectivity })],
                    )
                }
            }

            // From Pulling
            (Self::Pulling { since }, Event::PullSucceeded { latest }) => {
                (Self::Applying { since, latest }, vec![Action::Apply])
            }
            (Self::Pulling { .. }, Event::PullFailed { error }) => (
                Self::Idle,
                vec![Action::EmitEvent(SyncEvent::PullFailed { error })],
            ),

            // From Applying
            (Self::Applying { since, latest }, Event::ApplySucceeded { has_pending }) => {
                let commit_to = next_checkpoint(since, latest);
                let actions = if has_pending {
                    vec![Action::Push]
                } else {
                    vec![Action::WriteCheckpoint {
                        checkpoint: commit_to,
                    }]
                };
                (Self::Pushing { commit_to }, actions)
            }
            (Self::Applying { .. }, Event::ApplyFailed { error }) => (
                Self::Idle,
                vec![Action::EmitEvent(SyncEvent::ApplyFailed { error })],
            ),

            // From Pushing
            (Self::Pushing { commit_to }, Event::PushSucceeded) => (
                Self::Pushing { commit_to },
                vec![
                    Action::ClearPending,
                    Action::WriteCheckpoint {
                        checkpoint: commit_to,
                    },
                ],
            ),
            // Pull success is independent of push success: pending
            // mutations stay queued and the checkpoint still advances.
            (Self::Pushing { commit_to }, Event::PushFailed { error, conflict }) => (
                Self::Pushing { commit_to },
                vec![
                    Action::EmitEvent(SyncEvent::PushFailed { error, conflict }),
                    Action::WriteCheckpoint {
                        checkpoint: commit_to,
                    },
                ],
            ),
            (Self::Pushing { commit_to }, Event::CommitSucceeded) => (
                Self::Committed {
                    checkpoint: commit_to,
                },
                vec![Action::EmitEvent(SyncEvent::Completed {
                    checkpoint: commit_to,
                })],
            ),
            (Self::Pushing { .. }, Event::CommitFailed { error }) => (
                Self::Idle,
                vec![Action::EmitEvent(SyncEvent::CommitFailed { error })],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a cycle is in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Pulling { .. } | Self::Applying { .. } | Self::Pushing { .. }
        )
    }

    /// Check if the last cycle committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pulling { .. } => "pulling",
            Self::Applying { .. } => "applying",
            Self::Pushing { .. } => "pushing",
            Self::Committed { .. } => "committed",
        }
    }
}

/// Events that can occur during a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A cycle was triggered (connectivity transition or on demand).
    SyncRequested {
        /// Connectivity at trigger time.
        connectivity: Connectivity,
        /// Persisted checkpoint, `None` if never synced.
        checkpoint: Option<Checkpoint>,
    },
    /// The pull returned changes.
    PullSucceeded {
        /// `latestVersion` from the response.
        latest: Checkpoint,
    },
    /// The pull failed.
    PullFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// All pulled collections were applied in one transaction.
    ApplySucceeded {
        /// Whether local mutations are waiting to be pushed.
        has_pending: bool,
    },
    /// Applying the pull failed and was rolled back.
    ApplyFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The server accepted the push.
    PushSucceeded,
    /// The push failed.
    PushFailed {
        /// Error message describing the failure.
        error: String,
        /// Whether the server rejected the payload (as opposed to a network failure).
        conflict: bool,
    },
    /// The checkpoint (and pending-mutation clear, if any) was written.
    CommitSucceeded,
    /// Writing the checkpoint failed.
    CommitFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions to be executed by the rentx-client synchronizer.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Call `pullChangesSince(since)`.
    Pull {
        /// Checkpoint to pull from.
        since: Option<Checkpoint>,
    },
    /// Apply the pulled changes transactionally.
    Apply,
    /// Push coalesced pending mutations.
    Push,
    /// Clear the pending mutations that were pushed.
    ClearPending,
    /// Durably write the checkpoint.
    WriteCheckpoint {
        /// Value to write.
        checkpoint: Checkpoint,
    },
    /// Emit an event to the application.
    EmitEvent(SyncEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Not connected; no remote call was issued.
    SkippedOffline {
        /// The reading that gated the cycle.
        connectivity: Connectivity,
    },
    /// Pull failed; checkpoint and store untouched.
    PullFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Apply failed and rolled back; checkpoint untouched.
    ApplyFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Push failed; pending mutations retained for the next cycle.
    PushFailed {
        /// Error message describing the failure.
        error: String,
        /// Whether the server rejected the payload.
        conflict: bool,
    },
    /// Checkpoint write failed; the next cycle re-pulls the same range.
    CommitFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Cycle committed.
    Completed {
        /// The committed checkpoint.
        checkpoint: Checkpoint,
    },
}
