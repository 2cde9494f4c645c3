//! Show local sync state.

use anyhow::Result;
use rentx_client::{RemoteGateway, RentxClient};

/// Run the status command.
pub async fn run<G: RemoteGateway>(client: &RentxClient<G>) -> Result<()> {
    let status = client.status().await?;

    println!("=== rentx status ===");
    println!();
    match status.checkpoint {
        Some(checkpoint) => println!("Last synced version: {}", checkpoint),
        None => println!("Last synced version: never"),
    }
    println!("Connectivity:        {}", status.connectivity);
    println!("Sync phase:          {}", status.phase.name());
    println!("Pending changes:     {}", status.pending);
    println!();
    println!("Records:");
    if status.counts.is_empty() {
        println!("  (empty)");
    }
    for (collection, count) in &status.counts {
        println!("  {:<10} {}", collection, count);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{catalog_pull, client};
    use rentx_client::MockGateway;
    use rentx_core::Connectivity;

    #[tokio::test]
    async fn status_on_fresh_store() {
        let gateway = MockGateway::new();
        let client = client(Connectivity::Unknown, &gateway).await;
        assert!(run(&client).await.is_ok());
    }

    #[tokio::test]
    async fn status_after_sync() {
        let gateway = MockGateway::new();
        gateway.queue_pull(catalog_pull(4));
        let client = client(Connectivity::Connected, &gateway).await;
        client.synchronizer().sync_now().await.unwrap();

        assert!(run(&client).await.is_ok());
    }
}
