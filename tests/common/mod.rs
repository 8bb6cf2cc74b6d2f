#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use storefront::{
    config::{AppConfig, ReportConfig, SeedConfig},
    db,
    entities::{customer, order, order_product, product, CouponCode, OrderDates},
    ReportService, SeedService,
};

/// Helper harness backed by a fresh in-memory SQLite database.
pub struct TestDb {
    pub db: Arc<DatabaseConnection>,
}

impl TestDb {
    /// Connects and creates the schema. In-memory SQLite is per connection,
    /// so the pool is pinned to a single one.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::connect_and_prepare(&cfg)
            .await
            .expect("failed to create test database");

        Self { db: Arc::new(pool) }
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(self.db.clone(), ReportConfig::default())
    }

    pub fn seeder(&self, config: SeedConfig) -> SeedService {
        SeedService::new(self.db.clone(), config)
    }

    pub async fn customer(&self, first_name: &str, email: &str) -> customer::Model {
        customer::ActiveModel {
            first_name: Set(first_name.to_string()),
            last_name: Set("Tester".to_string()),
            address: Set("1 Main Street".to_string()),
            city: Set("Springfield".to_string()),
            postcode: Set("12345".to_string()),
            email: Set(email.to_string()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("insert customer")
    }

    pub async fn product(&self, name: &str, price: i32) -> product::Model {
        product::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("insert product")
    }

    pub async fn order(
        &self,
        customer_id: i32,
        dates: OrderDates,
        coupon: Option<CouponCode>,
    ) -> order::Model {
        dates
            .into_active_model(customer_id, coupon)
            .insert(&*self.db)
            .await
            .expect("insert order")
    }

    pub async fn link(&self, order_id: i32, product_id: i32) {
        order_product::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(product_id),
        }
        .insert(&*self.db)
        .await
        .expect("insert order/product link");
    }
}

pub fn seed_config(customers: u32, orders: u32, products: u32, rng_seed: u64) -> SeedConfig {
    SeedConfig {
        customers,
        orders,
        products,
        rng_seed: Some(rng_seed),
    }
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()
}
