//! Seed data script - creates the schema if needed and fills it with random data
//!
//! Run with: cargo run --bin seed-data
//!
//! Counts come from configuration (`[seed]` in config/*.toml or
//! `APP__SEED__*` variables). With the defaults this creates:
//! - 100 customers with addresses and unique emails
//! - 1000 orders placed this year, most shipped, some delivered
//! - 10 products named after colors
//! - 1 to 3 products per order

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use storefront::{config, create_random_data, db};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    info!("=== Storefront Seed Data ===");
    info!("Connecting to database: {}", config.database_url());

    let pool = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;
    let db = Arc::new(pool);

    let summary = create_random_data(db.clone(), &config.seed)
        .await
        .context("failed to seed database")?;

    info!("  Created {} customers", summary.customers);
    info!("  Created {} orders", summary.orders);
    info!("  Created {} products", summary.products);
    info!("  Linked {} order/product pairs", summary.order_products);
    info!("=== Seed Data Complete ===");
    info!("");
    info!("Try these reports:");
    info!("  cargo run --bin storefront -- report pending");
    info!("  cargo run --bin storefront -- report revenue --days 30");
    info!("  cargo run --bin storefront -- report big-spenders --amount 500");

    Ok(())
}
