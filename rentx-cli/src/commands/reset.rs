//! Wipe local data.

use anyhow::Result;
use rentx_client::{RemoteGateway, RentxClient};

/// Run the reset command.
pub async fn run<G: RemoteGateway>(client: &RentxClient<G>) -> Result<()> {
    let pending = client.status().await?.pending;
    client.reset().await?;

    println!("Local data wiped.");
    if pending > 0 {
        println!("Discarded {} unsent change(s).", pending);
    }
    Ok(())
}
