//! Mock gateway for testing.
//!
//! Allows queueing pull responses, forcing failures and capturing every
//! call for verification.

use super::{GatewayError, RemoteGateway};
use async_trait::async_trait;
use rentx_types::{Car, Changes, Checkpoint, PullResponse, RecordId, Rental};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A call received by [`MockGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    /// `fetch_car_by_id`
    FetchCar(RecordId),
    /// `fetch_rentals`
    FetchRentals,
    /// `pull_changes_since`
    Pull(Option<Checkpoint>),
    /// `push_local_changes`
    Push(Changes),
}

/// Mock gateway for testing.
///
/// Pulls with nothing queued fail with a network error, which is what an
/// unreachable server looks like to the synchronizer.
#[derive(Debug, Default)]
pub struct MockGateway {
    inner: Arc<Mutex<MockGatewayInner>>,
}

#[derive(Debug, Default)]
struct MockGatewayInner {
    calls: Vec<GatewayCall>,
    pull_queue: VecDeque<PullResponse>,
    pull_delay: Option<Duration>,
    cars: BTreeMap<RecordId, Car>,
    rentals: Vec<Rental>,
    fail_next_pull: Option<GatewayError>,
    fail_next_push: Option<GatewayError>,
    fail_next_fetch: Option<GatewayError>,
}

impl MockGateway {
    /// Create a new mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next `pull_changes_since()` call.
    pub fn queue_pull(&self, response: PullResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.pull_queue.push_back(response);
    }

    /// Delay every pull by `delay` (keeps a cycle in flight).
    pub fn set_pull_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.pull_delay = Some(delay);
    }

    /// Serve `car` from `fetch_car_by_id()`.
    pub fn set_car(&self, car: Car) {
        let mut inner = self.inner.lock().unwrap();
        inner.cars.insert(car.id.clone(), car);
    }

    /// Serve `rentals` from `fetch_rentals()`.
    pub fn set_rentals(&self, rentals: Vec<Rental>) {
        let mut inner = self.inner.lock().unwrap();
        inner.rentals = rentals;
    }

    /// Cause the next pull to fail with the given error.
    pub fn fail_next_pull(&self, error: GatewayError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_pull = Some(error);
    }

    /// Cause the next push to fail with the given error.
    pub fn fail_next_push(&self, error: GatewayError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_push = Some(error);
    }

    /// Cause the next car or rentals fetch to fail with the given error.
    pub fn fail_next_fetch(&self, error: GatewayError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch = Some(error);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        let inner = self.inner.lock().unwrap();
        inner.calls.clone()
    }

    /// Payloads of successful pushes.
    pub fn pushed(&self) -> Vec<Changes> {
        let inner = self.inner.lock().unwrap();
        inner
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Push(changes) => Some(changes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of pulls issued.
    pub fn pull_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::Pull(_)))
            .count()
    }

    /// Clear all state (queue, calls, failures).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockGatewayInner::default();
    }
}

impl Clone for MockGateway {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn fetch_car_by_id(&self, id: &RecordId) -> Result<Car, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(GatewayCall::FetchCar(id.clone()));

        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(error);
        }

        inner
            .cars
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("/cars/{}", id)))
    }

    async fn fetch_rentals(&self) -> Result<Vec<Rental>, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(GatewayCall::FetchRentals);

        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(error);
        }

        Ok(inner.rentals.clone())
    }

    async fn pull_changes_since(
        &self,
        since: Option<Checkpoint>,
    ) -> Result<PullResponse, GatewayError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(GatewayCall::Pull(since));
            inner.pull_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_pull.take() {
            return Err(error);
        }

        inner
            .pull_queue
            .pop_front()
            .ok_or_else(|| GatewayError::Network("connection refused".into()))
    }

    async fn push_local_changes(&self, changes: &Changes) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_push.take() {
            return Err(error);
        }

        inner.calls.push(GatewayCall::Push(changes.clone()));
        Ok(())
    }
}
