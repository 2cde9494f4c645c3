//! Process-wide connectivity monitor.
//!
//! The platform's reachability facility reports readings through
//! [`ConnectivityMonitor::report`]; nothing here probes the network itself.
//! Subscribers are woken only on transitions.

use rentx_core::Connectivity;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared tri-state connectivity signal.
///
/// Cheap to clone; all clones observe the same state. Starts `Unknown`.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityMonitor {
    /// Create a monitor in the `Unknown` state.
    pub fn new() -> Self {
        Self::with_state(Connectivity::Unknown)
    }

    /// Create a monitor with an initial reading.
    pub fn with_state(state: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Current reading.
    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    /// Record a platform reading.
    ///
    /// Returns `true` if this was a transition; subscribers are notified only then.
    pub fn report(&self, state: Connectivity) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::debug!(%state, "connectivity changed");
        }
        changed
    }

    /// Subscribe to transitions.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
