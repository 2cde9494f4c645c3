//! List the user's rentals.

use anyhow::Result;
use rentx_client::{RemoteGateway, RentxClient};

/// Run the rentals command.
pub async fn run<G: RemoteGateway>(client: &RentxClient<G>) -> Result<()> {
    let rentals = client.catalog().rentals().await?;

    if rentals.is_empty() {
        println!("No rentals");
        return Ok(());
    }

    println!("Rentals: {}", rentals.len());
    for rental in &rentals {
        let period = match rental.period_display() {
            Ok((start, end)) => format!("{} -> {}", start, end),
            Err(_) => format!("{} -> {}", rental.start_date, rental.end_date),
        };
        println!(
            "  {:<12} {} {}  {}",
            rental.id, rental.car.brand, rental.car.name, period
        );
    }

    Ok(())
}
