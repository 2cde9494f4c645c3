//! Run sync cycles.

use anyhow::Result;
use rentx_client::{CycleReport, PushOutcome, RemoteGateway, RentxClient};
use std::future::Future;

/// Run one cycle.
///
/// Network failures are reported but not fatal: the next cycle retries.
pub async fn once<G: RemoteGateway>(client: &RentxClient<G>) -> Result<()> {
    match client.synchronizer().sync_now().await {
        Ok(CycleReport::Completed(summary)) => {
            println!("Synced to version {}", summary.checkpoint);
            println!("  Applied:    {}", summary.applied);
            if summary.superseded > 0 {
                println!("  Overridden: {} local change(s)", summary.superseded);
            }
            match summary.push {
                PushOutcome::NothingPending => {}
                PushOutcome::Delivered { mutations } => {
                    println!("  Pushed:     {} local change(s)", mutations)
                }
                PushOutcome::Retained { conflict, error } => {
                    let reason = if conflict { "rejected" } else { "failed" };
                    println!("  Push {}: {} (kept for next sync)", reason, error);
                }
            }
        }
        Ok(CycleReport::SkippedOffline { connectivity }) => {
            println!("Sync skipped: {}", connectivity);
        }
        Ok(CycleReport::Coalesced) => {
            println!("Sync already in progress");
        }
        Err(e) if e.is_network() => {
            println!("Sync failed: {}", e);
            println!("Local data is unchanged; try again when online.");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Run the background loop until `shutdown` resolves.
pub async fn watch<G, F>(client: &RentxClient<G>, shutdown: F) -> Result<()>
where
    G: RemoteGateway,
    F: Future<Output = ()>,
{
    println!("Watching connectivity (Ctrl-C to stop)...");
    client.synchronizer().run(shutdown).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{catalog_pull, client};
    use rentx_client::{GatewayError, MockGateway};
    use rentx_core::Connectivity;
    use rentx_types::Checkpoint;

    #[tokio::test]
    async fn once_commits_catalog() {
        let gateway = MockGateway::new();
        gateway.queue_pull(catalog_pull(5));
        let client = client(Connectivity::Connected, &gateway).await;

        once(&client).await.unwrap();

        let status = client.status().await.unwrap();
        assert_eq!(status.checkpoint, Some(Checkpoint::new(5)));
        assert_eq!(status.counts.get("cars"), Some(&2));
    }

    #[tokio::test]
    async fn once_offline_is_skipped() {
        let gateway = MockGateway::new();
        let client = client(Connectivity::Disconnected, &gateway).await;
        assert!(once(&client).await.is_ok());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn once_network_failure_is_not_fatal() {
        let gateway = MockGateway::new();
        gateway.fail_next_pull(GatewayError::Network("refused".into()));
        let client = client(Connectivity::Connected, &gateway).await;
        assert!(once(&client).await.is_ok());
    }

    #[tokio::test]
    async fn once_decode_failure_is_an_error() {
        let gateway = MockGateway::new();
        gateway.fail_next_pull(GatewayError::Decode("unexpected eof".into()));
        let client = client(Connectivity::Connected, &gateway).await;
        assert!(once(&client).await.is_err());
    }

    #[tokio::test]
    async fn watch_stops_on_shutdown() {
        let gateway = MockGateway::new();
        gateway.queue_pull(catalog_pull(2));
        let client = client(Connectivity::Connected, &gateway).await;

        watch(&client, tokio::time::sleep(std::time::Duration::from_millis(50)))
            .await
            .unwrap();

        assert_eq!(gateway.pull_count(), 1);
    }
}
