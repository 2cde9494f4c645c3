//! CLI command implementations.

pub mod cars;
pub mod profile;
pub mod rentals;
pub mod reset;
pub mod status;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing {
    use rentx_client::{ConnectivityMonitor, MockGateway, RentxClient, SqliteStore, SyncOptions};
    use rentx_core::Connectivity;
    use rentx_types::{ChangeSet, Changes, Checkpoint, PullResponse};
    use serde_json::{json, Value};

    pub fn car(id: &str, brand: &str, name: &str) -> Value {
        json!({
            "id": id,
            "brand": brand,
            "name": name,
            "period": "Ao dia",
            "price": 120.0,
            "thumbnail": format!("https://example.com/{}.png", id)
        })
    }

    pub fn catalog_pull(latest: u64) -> PullResponse {
        PullResponse {
            changes: Changes::new().with(
                "cars",
                ChangeSet {
                    created: vec![car("c1", "Audi", "RS 5"), car("c2", "Porsche", "Panamera")],
                    ..ChangeSet::default()
                },
            ),
            latest_version: Checkpoint::new(latest),
        }
    }

    pub async fn client(
        state: Connectivity,
        gateway: &MockGateway,
    ) -> RentxClient<MockGateway> {
        RentxClient::with_gateway(
            SqliteStore::in_memory().await.unwrap(),
            gateway.clone(),
            ConnectivityMonitor::with_state(state),
            SyncOptions::default(),
        )
        .await
        .unwrap()
    }
}
