//! Read API for screens.
//!
//! Every read is served from the local store first. Remote calls happen
//! only on an explicit `connected` reading, and a failed call falls back
//! to the cached data instead of failing the read.

use std::sync::Arc;

use rentx_core::Connectivity;
use rentx_types::{collections, Car, ChangeSet, Photo, Record, RecordId, Rental};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::error::{CatalogError, StorageError};
use crate::gateway::{GatewayError, RemoteGateway};
use crate::store::{LocalStore, LocalStoreExt};

/// A car as shown on the details screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CarDetails {
    /// The car record.
    pub car: Car,
    /// Whether `car` came from the server during this read.
    pub refreshed: bool,
    /// Connectivity at read time.
    pub connectivity: Connectivity,
}

impl CarDetails {
    /// Daily price, hidden unless connected.
    pub fn display_price(&self) -> Option<f64> {
        self.connectivity.allows_remote().then_some(self.car.price)
    }

    /// Photos for the gallery.
    pub fn gallery(&self) -> Vec<Photo> {
        self.car.gallery()
    }
}

/// Cache-first catalog and profile access.
pub struct Catalog<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    monitor: ConnectivityMonitor,
}

impl<S, G> Clone for Catalog<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gateway: Arc::clone(&self.gateway),
            monitor: self.monitor.clone(),
        }
    }
}

impl<S, G> Catalog<S, G>
where
    S: LocalStore,
    G: RemoteGateway,
{
    /// Create a catalog over a store and gateway.
    pub fn new(store: Arc<S>, gateway: Arc<G>, monitor: ConnectivityMonitor) -> Self {
        Self {
            store,
            gateway,
            monitor,
        }
    }

    /// Whether actions that need the server (booking) are enabled.
    pub fn can_book(&self) -> bool {
        self.monitor.current().allows_remote()
    }

    /// Cached cars, sorted by brand then name.
    pub async fn cars(&self) -> Result<Vec<Car>, CatalogError> {
        let mut cars: Vec<Car> = self.store.fetch_readable().await?;
        cars.sort_by(|a, b| (&a.brand, &a.name).cmp(&(&b.brand, &b.name)));
        Ok(cars)
    }

    /// Number of cached cars.
    pub async fn car_count(&self) -> Result<u64, CatalogError> {
        let counts = self.store.counts().await?;
        Ok(counts.get(collections::CARS).copied().unwrap_or(0))
    }

    /// A single car, refreshed from the server when connected.
    ///
    /// The refreshed record is returned but not stored; cars change only
    /// through sync.
    pub async fn car_details(&self, id: &RecordId) -> Result<CarDetails, CatalogError> {
        let connectivity = self.monitor.current();
        let local: Option<Car> = match self.store.fetch(id).await {
            Ok(car) => car,
            Err(StorageError::Record(e)) => {
                warn!(%id, error = %e, "cached car unreadable, ignoring");
                None
            }
            Err(e) => return Err(e.into()),
        };

        if !connectivity.allows_remote() {
            let car = local.ok_or_else(|| not_found(collections::CARS, id))?;
            return Ok(CarDetails {
                car,
                refreshed: false,
                connectivity,
            });
        }

        match self.gateway.fetch_car_by_id(id).await {
            Ok(car) => Ok(CarDetails {
                car,
                refreshed: true,
                connectivity,
            }),
            Err(e) => {
                warn!(%id, error = %e, "car refresh failed, serving cached record");
                match (local, e) {
                    (Some(car), _) => Ok(CarDetails {
                        car,
                        refreshed: false,
                        connectivity,
                    }),
                    (None, GatewayError::NotFound(_)) => Err(not_found(collections::CARS, id)),
                    (None, e) => Err(e.into()),
                }
            }
        }
    }

    /// Rentals, refreshed from the server when connected.
    pub async fn rentals(&self) -> Result<Vec<Rental>, CatalogError> {
        if self.monitor.current().allows_remote() {
            match self.refresh_rentals().await {
                Ok(rentals) => return Ok(rentals),
                Err(e) => warn!(error = %e, "rentals refresh failed, serving cache"),
            }
        }
        self.cached_rentals().await
    }

    /// Fetch rentals from the server and cache them.
    pub async fn refresh_rentals(&self) -> Result<Vec<Rental>, CatalogError> {
        let mut rentals = self.gateway.fetch_rentals().await?;

        let updated = rentals
            .iter()
            .map(Record::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let set = ChangeSet {
            updated,
            ..ChangeSet::default()
        };
        let applied = self.store.apply_change_set(collections::RENTALS, &set).await?;
        debug!(applied, "rentals cached");

        sort_by_start(&mut rentals);
        Ok(rentals)
    }

    /// Cached rentals, oldest start date first.
    pub async fn cached_rentals(&self) -> Result<Vec<Rental>, CatalogError> {
        let mut rentals: Vec<Rental> = self.store.fetch_readable().await?;
        sort_by_start(&mut rentals);
        Ok(rentals)
    }

    /// A user profile from the local store.
    pub async fn user(&self, id: &RecordId) -> Result<Option<Value>, CatalogError> {
        Ok(self.store.get(collections::USERS, id).await?)
    }

    /// Merge `fields` into a user profile and queue the change for push.
    ///
    /// Creates the profile if it does not exist locally. Returns the stored
    /// record.
    pub async fn update_user(
        &self,
        id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<Value, CatalogError> {
        let mut record = match self.store.get(collections::USERS, id).await? {
            Some(Value::Object(existing)) => existing,
            Some(_) => {
                return Err(StorageError::Corrupt(format!("user {} is not an object", id)).into())
            }
            None => Map::new(),
        };
        record.extend(fields);
        record.insert("id".to_string(), Value::String(id.as_str().to_string()));

        let record = Value::Object(record);
        let mutation = self
            .store
            .record_local_change(collections::USERS, record.clone())
            .await?;
        debug!(%id, kind = mutation.kind.as_str(), "profile change queued");
        Ok(record)
    }

    /// Delete a user profile and queue the delete. Returns whether it existed.
    pub async fn delete_user(&self, id: &RecordId) -> Result<bool, CatalogError> {
        let mutation = self
            .store
            .record_local_delete(collections::USERS, id)
            .await?;
        Ok(mutation.is_some())
    }
}

fn not_found(collection: &'static str, id: &RecordId) -> CatalogError {
    CatalogError::NotFound {
        collection,
        id: id.to_string(),
    }
}

fn sort_by_start(rentals: &mut [Rental]) {
    rentals.sort_by(|a, b| {
        let ka = (a.start().ok(), &a.id);
        let kb = (b.start().ok(), &b.id);
        ka.cmp(&kb)
    });
}
