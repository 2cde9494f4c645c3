//! Synchronizer - drives pull/apply/push/commit cycles.
//!
//! The cycle logic lives in the rentx-core state machine; this module
//! interprets its actions against a [`LocalStore`] and a [`RemoteGateway`].
//!
//! ```text
//! ConnectivityMonitor ──► Synchronizer ──► RemoteGateway
//!                             │  ▲
//!                             ▼  │
//!                 rentx-core SyncPhase (pure)
//!                             │
//!                             ▼
//!                        LocalStore
//! ```
//!
//! At most one cycle runs at a time. A trigger that arrives while a cycle
//! is in flight is folded into a single follow-up cycle.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rentx_core::{
    Action, CheckpointTracker, Connectivity, Event, PushBatch, RetryPolicy, SyncEvent, SyncPhase,
};
use rentx_types::{Checkpoint, PullResponse};
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{CycleError, StorageError};
use crate::gateway::RemoteGateway;
use crate::store::{ApplyOutcome, LocalStore};

/// Synchronizer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Backoff between failed cycles in [`Synchronizer::run`].
    pub retry: RetryPolicy,
    /// Run a cycle whenever connectivity transitions to `connected`.
    pub sync_on_connect: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            sync_on_connect: true,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            retry: config.retry_policy(),
            sync_on_connect: config.sync_on_connect,
        }
    }
}

/// What happened to pending local mutations during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// No local mutations were waiting.
    NothingPending,
    /// The server accepted the push; these mutations were cleared.
    Delivered {
        /// Number of mutations cleared.
        mutations: usize,
    },
    /// The push failed; mutations stay queued for the next cycle.
    Retained {
        /// Whether the server rejected the payload.
        conflict: bool,
        /// Error message.
        error: String,
    },
}

/// Summary of a committed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    /// Checkpoint durably written by this cycle.
    pub checkpoint: Checkpoint,
    /// Changeset entries applied.
    pub applied: usize,
    /// Pending mutations discarded because the pull touched their record.
    pub superseded: usize,
    /// Push result.
    pub push: PushOutcome,
}

/// Result of [`Synchronizer::sync_now`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// The cycle committed.
    Completed(CycleSummary),
    /// Connectivity was not `connected`; no remote call was made.
    SkippedOffline {
        /// The reading that gated the cycle.
        connectivity: Connectivity,
    },
    /// Another cycle was in flight; it will run once more when it finishes.
    Coalesced,
}

/// Scratch state carried between actions of one cycle.
#[derive(Default)]
struct CycleContext {
    pulled: Option<PullResponse>,
    applied: ApplyOutcome,
    batch: PushBatch,
    cleared: Vec<Uuid>,
    push: Option<PushOutcome>,
    failure: Option<CycleError>,
    report: Option<CycleReport>,
}

/// Orchestrates sync cycles for one local store.
///
/// The checkpoint tracker lives behind the cycle lock, so holding the lock
/// is what makes a cycle "in flight".
pub struct Synchronizer<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    monitor: ConnectivityMonitor,
    options: SyncOptions,
    cycle: Mutex<CheckpointTracker>,
    rerun: AtomicBool,
    phase: watch::Sender<SyncPhase>,
}

impl<S, G> Synchronizer<S, G>
where
    S: LocalStore,
    G: RemoteGateway,
{
    /// Create a synchronizer, resuming from the persisted checkpoint.
    pub async fn open(
        store: Arc<S>,
        gateway: Arc<G>,
        monitor: ConnectivityMonitor,
        options: SyncOptions,
    ) -> Result<Self, StorageError> {
        let checkpoint = store.read_checkpoint().await?;
        debug!(?checkpoint, "synchronizer resuming");
        let (phase, _) = watch::channel(SyncPhase::new());

        Ok(Self {
            store,
            gateway,
            monitor,
            options,
            cycle: Mutex::new(CheckpointTracker::with_checkpoint(checkpoint)),
            rerun: AtomicBool::new(false),
            phase,
        })
    }

    /// Current cycle phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase.borrow().clone()
    }

    /// The connectivity monitor gating this synchronizer.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Run a cycle now.
    ///
    /// Returns [`CycleReport::Coalesced`] without waiting if a cycle is
    /// already in flight. Failures leave store and checkpoint as they were.
    pub async fn sync_now(&self) -> Result<CycleReport, CycleError> {
        let mut tracker = match self.cycle.try_lock() {
            Ok(tracker) => tracker,
            Err(_) => {
                self.rerun.store(true, Ordering::SeqCst);
                // The holder may have released before it could see the flag.
                match self.cycle.try_lock() {
                    Ok(tracker) => tracker,
                    Err(_) => {
                        debug!("cycle in flight, trigger coalesced");
                        return Ok(CycleReport::Coalesced);
                    }
                }
            }
        };

        loop {
            // A cycle starting now covers every trigger flagged so far.
            self.rerun.store(false, Ordering::SeqCst);
            let result = self.run_cycle(&mut tracker).await;
            drop(tracker);

            if !self.rerun.load(Ordering::SeqCst) {
                return result;
            }
            tracker = match self.cycle.try_lock() {
                Ok(tracker) => tracker,
                // Whoever holds the lock now starts after the trigger.
                Err(_) => return result,
            };
            debug!("running coalesced cycle");
        }
    }

    /// Wipe the local store and forget the checkpoint.
    ///
    /// Waits for an in-flight cycle to finish first.
    pub async fn reset(&self) -> Result<(), StorageError> {
        let mut tracker = self.cycle.lock().await;
        self.store.reset().await?;
        tracker.reset();
        self.phase.send_replace(SyncPhase::Idle);
        info!("local store reset");
        Ok(())
    }

    /// Background loop until `shutdown` resolves.
    ///
    /// Runs a cycle on every transition to `connected` (and on start if
    /// already connected), and retries failed cycles with backoff while
    /// still connected.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut connectivity = self.monitor.subscribe();
        let mut attempt: u32 = 0;
        let mut retry_at: Option<Instant> = None;
        let mut trigger =
            self.options.sync_on_connect && connectivity.borrow_and_update().allows_remote();

        info!(sync_on_connect = self.options.sync_on_connect, "sync loop started");

        loop {
            if trigger {
                trigger = false;
                match self.sync_now().await {
                    Ok(_) => {
                        attempt = 0;
                        retry_at = None;
                    }
                    Err(e) => {
                        attempt = attempt.saturating_add(1);
                        let delay = self.options.retry.delay(attempt);
                        warn!(error = %e, attempt, ?delay, "sync cycle failed, will retry");
                        retry_at = Some(Instant::now() + delay);
                    }
                }
            }

            let retry = async move {
                match retry_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!("sync loop stopped");
                    return;
                }
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let state = *connectivity.borrow_and_update();
                    if state.allows_remote() {
                        if self.options.sync_on_connect {
                            attempt = 0;
                            trigger = true;
                        }
                    } else {
                        retry_at = None;
                    }
                }
                _ = retry => {
                    if self.monitor.current().allows_remote() {
                        trigger = true;
                    } else {
                        retry_at = None;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self, tracker: &mut CheckpointTracker) -> Result<CycleReport, CycleError> {
        let mut ctx = CycleContext::default();
        let mut phase = self.phase();
        let mut queue: VecDeque<Action> = VecDeque::new();

        let trigger = Event::SyncRequested {
            connectivity: self.monitor.current(),
            checkpoint: tracker.current(),
        };
        self.transition(&mut phase, trigger, &mut queue);

        while let Some(action) = queue.pop_front() {
            if let Some(event) = self.execute(action, tracker, &mut ctx).await {
                self.transition(&mut phase, event, &mut queue);
            }
        }

        if let Some(failure) = ctx.failure {
            return Err(failure);
        }
        ctx.report
            .ok_or_else(|| CycleError::Interrupted(phase.name()))
    }

    fn transition(&self, phase: &mut SyncPhase, event: Event, queue: &mut VecDeque<Action>) {
        let (next, actions) = std::mem::take(phase).on_event(event);
        *phase = next;
        self.phase.send_replace(phase.clone());
        queue.extend(actions);
    }

    async fn execute(
        &self,
        action: Action,
        tracker: &mut CheckpointTracker,
        ctx: &mut CycleContext,
    ) -> Option<Event> {
        match action {
            Action::Pull { since } => match self.gateway.pull_changes_since(since).await {
                Ok(response) => {
                    let latest = response.latest_version;
                    debug!(?since, %latest, collections = response.changes.len(), "pulled");
                    ctx.pulled = Some(response);
                    Some(Event::PullSucceeded { latest })
                }
                Err(e) => {
                    let error = e.to_string();
                    ctx.failure = Some(CycleError::Pull(e));
                    Some(Event::PullFailed { error })
                }
            },

            Action::Apply => {
                let changes = ctx.pulled.take().map(|r| r.changes).unwrap_or_default();
                match self.apply(&changes, ctx).await {
                    Ok(has_pending) => Some(Event::ApplySucceeded { has_pending }),
                    Err(e) => {
                        let error = e.to_string();
                        ctx.failure = Some(CycleError::Apply(e));
                        Some(Event::ApplyFailed { error })
                    }
                }
            }

            Action::Push => {
                if ctx.batch.is_empty() {
                    // Everything pending cancelled out; clear without a request.
                    ctx.push = Some(PushOutcome::Delivered { mutations: 0 });
                    return Some(Event::PushSucceeded);
                }
                match self.gateway.push_local_changes(ctx.batch.changes()).await {
                    Ok(()) => {
                        ctx.push = Some(PushOutcome::Delivered {
                            mutations: ctx.batch.mutation_ids().len(),
                        });
                        Some(Event::PushSucceeded)
                    }
                    Err(e) => {
                        let conflict = e.is_conflict();
                        let error = e.to_string();
                        ctx.push = Some(PushOutcome::Retained {
                            conflict,
                            error: error.clone(),
                        });
                        Some(Event::PushFailed { error, conflict })
                    }
                }
            }

            Action::ClearPending => {
                ctx.cleared = ctx.batch.mutation_ids().to_vec();
                None
            }

            Action::WriteCheckpoint { checkpoint } => {
                match self.store.commit(checkpoint, &ctx.cleared).await {
                    Ok(()) => {
                        tracker.advance(checkpoint);
                        Some(Event::CommitSucceeded)
                    }
                    Err(e) => {
                        let error = e.to_string();
                        ctx.failure = Some(CycleError::Commit(e));
                        Some(Event::CommitFailed { error })
                    }
                }
            }

            Action::EmitEvent(event) => {
                self.emit(event, ctx);
                None
            }
        }
    }

    /// Apply the pull and stage pending mutations for the push step.
    ///
    /// Returns whether anything is pending.
    async fn apply(
        &self,
        changes: &rentx_types::Changes,
        ctx: &mut CycleContext,
    ) -> Result<bool, StorageError> {
        ctx.applied = self.store.apply_pull(changes).await?;
        if ctx.applied.superseded > 0 {
            debug!(
                superseded = ctx.applied.superseded,
                "pulled records replaced pending local mutations"
            );
        }

        let pending = self.store.pending_mutations().await?;
        ctx.batch = PushBatch::build(&pending);
        Ok(!pending.is_empty())
    }

    fn emit(&self, event: SyncEvent, ctx: &mut CycleContext) {
        match event {
            SyncEvent::SkippedOffline { connectivity } => {
                debug!(%connectivity, "not connected, sync skipped");
                ctx.report = Some(CycleReport::SkippedOffline { connectivity });
            }
            SyncEvent::PullFailed { error } => {
                warn!(%error, "pull failed, checkpoint unchanged");
            }
            SyncEvent::ApplyFailed { error } => {
                error!(%error, "apply failed and was rolled back");
            }
            SyncEvent::PushFailed { error, conflict } => {
                warn!(%error, conflict, "push failed, local changes kept for next cycle");
            }
            SyncEvent::CommitFailed { error } => {
                error!(%error, "checkpoint write failed");
            }
            SyncEvent::Completed { checkpoint } => {
                let push = ctx.push.take().unwrap_or(PushOutcome::NothingPending);
                info!(
                    %checkpoint,
                    applied = ctx.applied.applied,
                    superseded = ctx.applied.superseded,
                    ?push,
                    "sync cycle committed"
                );
                ctx.report = Some(CycleReport::Completed(CycleSummary {
                    checkpoint,
                    applied: ctx.applied.applied,
                    superseded: ctx.applied.superseded,
                    push,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayCall, GatewayError, MockGateway};
    use crate::store::SqliteStore;
    use rentx_types::{ChangeSet, Changes, RecordId};
    use serde_json::{json, Value};
    use std::time::Duration;

    type TestSync = Synchronizer<SqliteStore, MockGateway>;

    async fn setup(state: Connectivity) -> (TestSync, Arc<SqliteStore>, MockGateway) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let gateway = MockGateway::new();
        let options = SyncOptions {
            retry: RetryPolicy {
                base: Duration::from_millis(10),
                max: Duration::from_millis(50),
                jitter: Duration::ZERO,
            },
            sync_on_connect: true,
        };
        let sync = Synchronizer::open(
            store.clone(),
            Arc::new(gateway.clone()),
            ConnectivityMonitor::with_state(state),
            options,
        )
        .await
        .unwrap();
        (sync, store, gateway)
    }

    fn car(id: &str) -> Value {
        json!({
            "id": id,
            "brand": "Porsche",
            "name": "Panamera",
            "period": "Ao dia",
            "price": 340.0,
            "thumbnail": "https://example.com/panamera.png"
        })
    }

    fn pull(collection: &str, set: ChangeSet, latest: u64) -> PullResponse {
        PullResponse {
            changes: Changes::new().with(collection, set),
            latest_version: Checkpoint::new(latest),
        }
    }

    fn created(records: Vec<Value>) -> ChangeSet {
        ChangeSet {
            created: records,
            ..ChangeSet::default()
        }
    }

    fn completed(report: CycleReport) -> CycleSummary {
        match report {
            CycleReport::Completed(summary) => summary,
            other => panic!("expected a completed cycle, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn first_cycle_applies_and_commits() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));

        let summary = completed(sync.sync_now().await.unwrap());

        assert_eq!(summary.checkpoint, Checkpoint::new(5));
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.push, PushOutcome::NothingPending);
        assert_eq!(store.get("cars", &"c1".into()).await.unwrap(), Some(car("c1")));
        assert_eq!(store.read_checkpoint().await.unwrap(), Some(Checkpoint::new(5)));
        assert_eq!(gateway.calls(), vec![GatewayCall::Pull(None)]);
        assert!(sync.phase().is_committed());
    }

    #[tokio::test]
    async fn pull_failure_keeps_checkpoint_and_store() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));
        sync.sync_now().await.unwrap();
        let before = store.query("cars").await.unwrap();

        gateway.fail_next_pull(GatewayError::Network("connection reset".into()));
        let err = sync.sync_now().await.unwrap_err();

        assert!(err.is_network());
        assert_eq!(store.read_checkpoint().await.unwrap(), Some(Checkpoint::new(5)));
        assert_eq!(store.query("cars").await.unwrap(), before);
        assert_eq!(sync.phase(), SyncPhase::Idle);
        assert_eq!(gateway.calls()[1], GatewayCall::Pull(Some(Checkpoint::new(5))));
    }

    #[tokio::test]
    async fn push_conflict_still_advances_checkpoint() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        store
            .record_local_change("users", json!({"id": "u1", "name": "Ana"}))
            .await
            .unwrap();

        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));
        gateway.fail_next_push(GatewayError::Conflict("rejected".into()));
        let summary = completed(sync.sync_now().await.unwrap());

        assert!(matches!(summary.push, PushOutcome::Retained { conflict: true, .. }));
        assert_eq!(store.read_checkpoint().await.unwrap(), Some(Checkpoint::new(5)));
        assert_eq!(store.pending_mutations().await.unwrap().len(), 1);

        gateway.queue_pull(pull("cars", ChangeSet::default(), 9));
        let summary = completed(sync.sync_now().await.unwrap());

        assert_eq!(summary.push, PushOutcome::Delivered { mutations: 1 });
        assert_eq!(store.read_checkpoint().await.unwrap(), Some(Checkpoint::new(9)));
        assert!(store.pending_mutations().await.unwrap().is_empty());

        let pushed = gateway.pushed();
        assert_eq!(pushed.len(), 1);
        let users = pushed[0].get("users").unwrap();
        assert_eq!(users.created, vec![json!({"id": "u1", "name": "Ana"})]);
    }

    #[tokio::test]
    async fn push_network_failure_keeps_mutations_and_advances() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        store
            .record_local_change("users", json!({"id": "u1", "name": "Ana"}))
            .await
            .unwrap();

        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 6));
        gateway.fail_next_push(GatewayError::Network("timed out".into()));
        let summary = completed(sync.sync_now().await.unwrap());

        assert!(matches!(summary.push, PushOutcome::Retained { conflict: false, .. }));
        assert_eq!(summary.checkpoint, Checkpoint::new(6));
        assert_eq!(store.read_checkpoint().await.unwrap(), Some(Checkpoint::new(6)));
        assert_eq!(store.pending_mutations().await.unwrap().len(), 1);
        assert!(gateway.pushed().is_empty());
    }

    #[tokio::test]
    async fn offline_or_unknown_issues_no_remote_call() {
        for state in [Connectivity::Disconnected, Connectivity::Unknown] {
            let (sync, store, gateway) = setup(state).await;
            gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));

            let report = sync.sync_now().await.unwrap();

            assert_eq!(report, CycleReport::SkippedOffline { connectivity: state });
            assert!(gateway.calls().is_empty());
            assert_eq!(store.read_checkpoint().await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn pulled_value_wins_over_pending_local_edit() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        store
            .record_local_change("users", json!({"id": "u1", "name": "local"}))
            .await
            .unwrap();

        let server = json!({"id": "u1", "name": "server"});
        gateway.queue_pull(pull(
            "users",
            ChangeSet {
                updated: vec![server.clone()],
                ..ChangeSet::default()
            },
            3,
        ));
        let summary = completed(sync.sync_now().await.unwrap());

        assert_eq!(summary.superseded, 1);
        assert_eq!(summary.push, PushOutcome::NothingPending);
        assert_eq!(store.get("users", &"u1".into()).await.unwrap(), Some(server));
        assert!(gateway.pushed().is_empty());
        assert!(store.pending_mutations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_apply_rolls_back_and_keeps_checkpoint() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        gateway.queue_pull(pull(
            "cars",
            created(vec![car("c2"), json!({"brand": "missing id"})]),
            7,
        ));

        let err = sync.sync_now().await.unwrap_err();

        assert!(matches!(err, CycleError::Apply(_)));
        assert!(!err.is_network());
        assert!(store.query("cars").await.unwrap().is_empty());
        assert_eq!(store.read_checkpoint().await.unwrap(), None);
    }

    #[tokio::test]
    async fn older_latest_version_keeps_checkpoint() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));
        gateway.queue_pull(pull("cars", ChangeSet::default(), 3));

        sync.sync_now().await.unwrap();
        let summary = completed(sync.sync_now().await.unwrap());

        assert_eq!(summary.checkpoint, Checkpoint::new(5));
        assert_eq!(store.read_checkpoint().await.unwrap(), Some(Checkpoint::new(5)));
    }

    #[tokio::test]
    async fn replayed_pull_is_idempotent() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        let response = pull(
            "cars",
            ChangeSet {
                created: vec![car("c1"), car("c2")],
                updated: vec![car("c3")],
                deleted: vec!["c9".into()],
            },
            4,
        );
        gateway.queue_pull(response.clone());
        gateway.queue_pull(response);

        sync.sync_now().await.unwrap();
        let once = store.query("cars").await.unwrap();
        sync.sync_now().await.unwrap();

        assert_eq!(store.query("cars").await.unwrap(), once);
        assert_eq!(once.len(), 3);
    }

    #[tokio::test]
    async fn checkpoint_never_decreases_across_cycles() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        for latest in [2, 6, 4, 6, 11, 1] {
            gateway.queue_pull(pull("cars", ChangeSet::default(), latest));
        }

        let mut last = 0;
        for _ in 0..6 {
            sync.sync_now().await.unwrap();
            let current = store.read_checkpoint().await.unwrap().unwrap().value();
            assert!(current >= last);
            last = current;
        }
        assert_eq!(last, 11);
    }

    #[tokio::test]
    async fn trigger_during_cycle_is_coalesced() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        gateway.set_pull_delay(Duration::from_millis(100));
        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));
        gateway.queue_pull(pull("cars", created(vec![car("c2")]), 8));

        let (first, second, third) = tokio::join!(
            sync.sync_now(),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                sync.sync_now().await
            },
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                sync.sync_now().await
            }
        );

        assert_eq!(second.unwrap(), CycleReport::Coalesced);
        assert_eq!(third.unwrap(), CycleReport::Coalesced);
        assert_eq!(completed(first.unwrap()).checkpoint, Checkpoint::new(8));
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::Pull(None),
                GatewayCall::Pull(Some(Checkpoint::new(5)))
            ]
        );
        assert_eq!(store.query("cars").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn flagged_trigger_runs_exactly_one_later_cycle() {
        let (sync, _store, gateway) = setup(Connectivity::Connected).await;
        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));
        gateway.queue_pull(pull("cars", ChangeSet::default(), 6));

        let held = sync.cycle.try_lock().unwrap();
        assert_eq!(sync.sync_now().await.unwrap(), CycleReport::Coalesced);
        drop(held);

        let summary = completed(sync.sync_now().await.unwrap());

        assert_eq!(summary.checkpoint, Checkpoint::new(5));
        assert_eq!(gateway.pull_count(), 1);
        assert!(!sync.rerun.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn mutations_that_cancel_out_are_cleared_without_push() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        store
            .record_local_change("users", json!({"id": "u1"}))
            .await
            .unwrap();
        store
            .record_local_delete("users", &RecordId::from("u1"))
            .await
            .unwrap();

        gateway.queue_pull(pull("cars", ChangeSet::default(), 1));
        completed(sync.sync_now().await.unwrap());

        assert!(gateway.pushed().is_empty());
        assert!(store.pending_mutations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resumes_from_persisted_checkpoint() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        store.write_checkpoint(Checkpoint::new(12)).await.unwrap();
        let gateway = MockGateway::new();
        gateway.queue_pull(pull("cars", ChangeSet::default(), 13));

        let sync = Synchronizer::open(
            store.clone(),
            Arc::new(gateway.clone()),
            ConnectivityMonitor::with_state(Connectivity::Connected),
            SyncOptions::default(),
        )
        .await
        .unwrap();
        sync.sync_now().await.unwrap();

        assert_eq!(gateway.calls(), vec![GatewayCall::Pull(Some(Checkpoint::new(12)))]);
    }

    #[tokio::test]
    async fn reset_forgets_checkpoint() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));
        gateway.queue_pull(pull("cars", ChangeSet::default(), 5));
        sync.sync_now().await.unwrap();

        sync.reset().await.unwrap();
        assert!(store.query("cars").await.unwrap().is_empty());
        assert_eq!(sync.phase(), SyncPhase::Idle);

        sync.sync_now().await.unwrap();
        assert_eq!(gateway.calls()[1], GatewayCall::Pull(None));
    }

    async fn wait_for(gateway: &MockGateway, pulls: usize) {
        for _ in 0..200 {
            if gateway.pull_count() >= pulls {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} pulls, saw {}", pulls, gateway.pull_count());
    }

    #[tokio::test]
    async fn run_loop_syncs_on_connect() {
        let (sync, store, gateway) = setup(Connectivity::Disconnected).await;
        let sync = Arc::new(sync);
        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let runner = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.run(async {
                    let _ = stop_rx.await;
                })
                .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(gateway.pull_count(), 0);

        sync.monitor().report(Connectivity::Connected);
        wait_for(&gateway, 1).await;

        let _ = stop_tx.send(());
        runner.await.unwrap();
        assert_eq!(store.read_checkpoint().await.unwrap(), Some(Checkpoint::new(5)));
    }

    #[tokio::test]
    async fn run_loop_retries_failed_cycle() {
        let (sync, store, gateway) = setup(Connectivity::Connected).await;
        let sync = Arc::new(sync);
        // Nothing queued: the first pull fails like an unreachable server.

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let runner = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.run(async {
                    let _ = stop_rx.await;
                })
                .await;
            })
        };

        wait_for(&gateway, 1).await;
        gateway.queue_pull(pull("cars", created(vec![car("c1")]), 5));

        let mut committed = None;
        for _ in 0..200 {
            committed = store.read_checkpoint().await.unwrap();
            if committed.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let _ = stop_tx.send(());
        runner.await.unwrap();
        assert_eq!(committed, Some(Checkpoint::new(5)));
        assert!(gateway.pull_count() >= 2);
    }
}
