//! Browse the car catalog.

use anyhow::Result;
use rentx_client::{CatalogError, RemoteGateway, RentxClient};
use rentx_types::RecordId;

/// List cached cars.
pub async fn list<G: RemoteGateway>(client: &RentxClient<G>) -> Result<()> {
    let cars = client.catalog().cars().await?;

    println!("Total of {} cars", cars.len());
    for car in &cars {
        println!(
            "  {:<12} {} {} - {} R$ {:.2}",
            car.id, car.brand, car.name, car.period, car.price
        );
    }

    Ok(())
}

/// Show one car.
pub async fn show<G: RemoteGateway>(client: &RentxClient<G>, id: &str) -> Result<()> {
    let details = match client.catalog().car_details(&RecordId::from(id)).await {
        Ok(details) => details,
        Err(CatalogError::NotFound { .. }) => {
            anyhow::bail!("Car {} not found. Run 'rentx sync' to refresh the catalog.", id)
        }
        Err(e) => return Err(e.into()),
    };
    let car = &details.car;

    println!("{} {}", car.brand, car.name);
    match details.display_price() {
        Some(price) => println!("  {}: R$ {:.2}", car.period, price),
        None => println!("  {}: R$ ...", car.period),
    }
    if !car.about.is_empty() {
        println!("  {}", car.about);
    }
    for accessory in &car.accessories {
        println!("  - {} ({})", accessory.name, accessory.kind);
    }
    println!("  Photos: {}", details.gallery().len());
    if !details.refreshed {
        println!("  (cached)");
    }
    if !client.catalog().can_book() {
        println!("  Booking unavailable offline");
    }

    Ok(())
}
