//! Synthetic data generator.
//!
//! Seeding runs in four phases (customers, orders, products, order/product
//! associations). Each phase is built in memory and then written with chunked
//! bulk inserts inside a single transaction, so a failing phase leaves no
//! partial rows behind.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use fake::faker::address::en::{BuildingNumber, CityName, StreetName, ZipCode};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use metrics::counter;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::config::SeedConfig;
use crate::db::{run_migrations, DatabaseAccess};
use crate::entities::{customer, order, order_product, product, CouponCode, OrderDates};
use crate::errors::ServiceError;

/// Product names are drawn from this list without replacement.
pub const COLOR_NAMES: &[&str] = &[
    "AliceBlue",
    "Amethyst",
    "AntiqueWhite",
    "Aquamarine",
    "Azure",
    "Beige",
    "Bisque",
    "BlanchedAlmond",
    "BlueViolet",
    "BurlyWood",
    "CadetBlue",
    "Chartreuse",
    "Chocolate",
    "Coral",
    "CornflowerBlue",
    "Cornsilk",
    "Crimson",
    "DarkCyan",
    "DarkGoldenRod",
    "DarkKhaki",
    "DarkOliveGreen",
    "DarkOrchid",
    "DarkSalmon",
    "DarkSeaGreen",
    "DarkSlateBlue",
    "DeepPink",
    "DeepSkyBlue",
    "DodgerBlue",
    "FireBrick",
    "ForestGreen",
    "Gainsboro",
    "GoldenRod",
    "HoneyDew",
    "HotPink",
    "IndianRed",
    "Indigo",
    "Ivory",
    "Khaki",
    "Lavender",
    "LavenderBlush",
    "LawnGreen",
    "LemonChiffon",
    "LightCoral",
    "LightSeaGreen",
    "LimeGreen",
    "Linen",
    "Maroon",
    "MediumAquaMarine",
    "MidnightBlue",
    "MintCream",
    "MistyRose",
    "Moccasin",
    "NavajoWhite",
    "OldLace",
    "Olive",
    "OliveDrab",
    "Orchid",
    "PaleGoldenRod",
    "PapayaWhip",
    "PeachPuff",
    "Peru",
    "Plum",
    "PowderBlue",
    "RosyBrown",
    "RoyalBlue",
    "SaddleBrown",
    "Salmon",
    "SandyBrown",
    "SeaShell",
    "Sienna",
    "SlateGray",
    "SpringGreen",
    "SteelBlue",
    "Tan",
    "Teal",
    "Thistle",
    "Tomato",
    "Turquoise",
    "Wheat",
    "YellowGreen",
];

const SHIP_PROBABILITY: f64 = 0.9;
const DELIVER_PROBABILITY: f64 = 0.5;
/// Weights for no coupon followed by each entry of `CouponCode::ALL`.
const COUPON_WEIGHTS: [u32; 4] = [85, 5, 5, 5];
const MIN_PRICE: i32 = 10;
const MAX_PRICE: i32 = 100;
const MAX_PRODUCTS_PER_ORDER: usize = 3;
const MAX_EMAIL_ATTEMPTS: usize = 20;
/// Rows per INSERT statement; keeps every statement under SQLite's bind limit.
const INSERT_CHUNK_ROWS: usize = 100;

/// Row counts written by one seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub customers: u64,
    pub orders: u64,
    pub products: u64,
    pub order_products: u64,
}

/// A fabricated customer, checked before it is turned into a row.
#[derive(Debug, Clone, Validate)]
pub struct NewCustomer {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 1, max = 50))]
    pub city: String,
    #[validate(length(min = 1, max = 50))]
    pub postcode: String,
    #[validate(email, length(max = 50))]
    pub email: String,
}

impl NewCustomer {
    pub fn into_active_model(self) -> customer::ActiveModel {
        customer::ActiveModel {
            first_name: Set(self.first_name),
            last_name: Set(self.last_name),
            address: Set(self.address),
            city: Set(self.city),
            postcode: Set(self.postcode),
            email: Set(self.email),
            ..Default::default()
        }
    }
}

/// Populates the store with random customers, orders and products.
pub struct SeedService {
    db_access: DatabaseAccess,
    config: SeedConfig,
}

impl SeedService {
    pub fn new(db: Arc<DatabaseConnection>, config: SeedConfig) -> Self {
        Self {
            db_access: DatabaseAccess::new(db),
            config,
        }
    }

    /// Seeds with "now" as the upper bound of every generated timestamp.
    pub async fn run(&self) -> Result<SeedSummary, ServiceError> {
        self.run_at(Utc::now()).await
    }

    /// Seeds with an explicit upper bound for generated timestamps. Order
    /// dates fall between 1 January of `now`'s year and `now`.
    #[instrument(skip(self), fields(customers = self.config.customers, orders = self.config.orders, products = self.config.products))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<SeedSummary, ServiceError> {
        self.config.validate_all()?;

        let mut rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let year_start = start_of_year(now)?;

        let customers = self.add_customers(&mut rng).await?;
        let first_new_order = self.max_order_id().await? + 1;
        let orders = self.add_orders(&mut rng, year_start, now).await?;
        let products = self.add_products(&mut rng).await?;
        let order_products = self.add_order_products(&mut rng, first_new_order).await?;

        let summary = SeedSummary {
            customers,
            orders,
            products,
            order_products,
        };

        info!(
            customers = summary.customers,
            orders = summary.orders,
            products = summary.products,
            order_products = summary.order_products,
            "Seeding complete"
        );
        Ok(summary)
    }

    async fn add_customers(&self, rng: &mut StdRng) -> Result<u64, ServiceError> {
        let rows: Vec<customer::ActiveModel> = fabricate_customers(rng, self.config.customers as usize)?
            .into_iter()
            .map(NewCustomer::into_active_model)
            .collect();

        self.insert_phase("customers", rows).await
    }

    async fn add_orders(
        &self,
        rng: &mut StdRng,
        year_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        if self.config.orders == 0 {
            return Ok(0);
        }

        let customer_ids: Vec<i32> = self
            .db_access
            .execute("load_customer_ids", |db| async move {
                customer::Entity::find()
                    .select_only()
                    .column(customer::Column::Id)
                    .order_by_asc(customer::Column::Id)
                    .into_tuple::<i32>()
                    .all(&*db)
                    .await
            })
            .await?;

        if customer_ids.is_empty() {
            return Err(ServiceError::InvalidInput(
                "cannot create orders without any customers".to_string(),
            ));
        }

        let coupons = coupon_distribution()?;
        let mut rows = Vec::with_capacity(self.config.orders as usize);
        for _ in 0..self.config.orders {
            let customer_id = *customer_ids
                .choose(rng)
                .ok_or_else(|| ServiceError::InternalError("empty customer pool".to_string()))?;
            let dates = random_order_dates(rng, year_start, now)?;
            let coupon = pick_coupon(rng, &coupons);
            rows.push(dates.into_active_model(customer_id, coupon));
        }

        self.insert_phase("orders", rows).await
    }

    async fn add_products(&self, rng: &mut StdRng) -> Result<u64, ServiceError> {
        let rows: Vec<product::ActiveModel> = COLOR_NAMES
            .choose_multiple(rng, self.config.products as usize)
            .map(|name| product::ActiveModel {
                name: Set((*name).to_string()),
                price: Set(rng_price(rng)),
                ..Default::default()
            })
            .collect();

        self.insert_phase("products", rows).await
    }

    /// Attaches products to the orders created by this run, i.e. those with
    /// an id of at least `first_new_order`.
    async fn add_order_products(
        &self,
        rng: &mut StdRng,
        first_new_order: i32,
    ) -> Result<u64, ServiceError> {
        let order_ids: Vec<i32> = self
            .db_access
            .execute("load_new_order_ids", |db| async move {
                order::Entity::find()
                    .select_only()
                    .column(order::Column::Id)
                    .filter(order::Column::Id.gte(first_new_order))
                    .order_by_asc(order::Column::Id)
                    .into_tuple::<i32>()
                    .all(&*db)
                    .await
            })
            .await?;

        if order_ids.is_empty() {
            return Ok(0);
        }

        let product_ids: Vec<i32> = self
            .db_access
            .execute("load_product_ids", |db| async move {
                product::Entity::find()
                    .select_only()
                    .column(product::Column::Id)
                    .order_by_asc(product::Column::Id)
                    .into_tuple::<i32>()
                    .all(&*db)
                    .await
            })
            .await?;

        let mut rows = Vec::with_capacity(order_ids.len() * 2);
        for order_id in order_ids {
            for product_id in pick_products(rng, &product_ids)? {
                rows.push(order_product::ActiveModel {
                    order_id: Set(order_id),
                    product_id: Set(product_id),
                });
            }
        }

        self.insert_phase("order_products", rows).await
    }

    async fn max_order_id(&self) -> Result<i32, ServiceError> {
        let max: Option<Option<i32>> = self
            .db_access
            .execute("max_order_id", |db| async move {
                order::Entity::find()
                    .select_only()
                    .column_as(order::Column::Id.max(), "max_id")
                    .into_tuple::<Option<i32>>()
                    .one(&*db)
                    .await
            })
            .await?;

        Ok(max.flatten().unwrap_or(0))
    }

    /// Writes one phase in a single transaction.
    async fn insert_phase<A>(&self, phase: &'static str, rows: Vec<A>) -> Result<u64, ServiceError>
    where
        A: ActiveModelTrait + Send + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        debug!(phase, rows = rows.len(), "Inserting seed phase");

        let inserted = self
            .db_access
            .transaction(phase, move |txn| {
                Box::pin(async move {
                    insert_chunked(txn, rows)
                        .await
                        .map_err(ServiceError::DatabaseError)
                })
            })
            .await?;

        counter!("storefront_seed.rows_inserted", inserted, "phase" => phase);
        info!(phase, inserted, "Seed phase committed");
        Ok(inserted)
    }
}

/// Creates the schema when it is missing, then seeds with `config`.
pub async fn create_random_data(
    db: Arc<DatabaseConnection>,
    config: &SeedConfig,
) -> Result<SeedSummary, ServiceError> {
    run_migrations(&db).await?;
    SeedService::new(db, config.clone()).run().await
}

async fn insert_chunked<A>(txn: &DatabaseTransaction, rows: Vec<A>) -> Result<u64, DbErr>
where
    A: ActiveModelTrait + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    let mut inserted = 0;
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        let chunk: Vec<A> = rows.by_ref().take(INSERT_CHUNK_ROWS).collect();
        inserted += <A::Entity as EntityTrait>::insert_many(chunk)
            .exec_without_returning(txn)
            .await?;
    }
    Ok(inserted)
}

fn start_of_year(now: DateTime<Utc>) -> Result<DateTime<Utc>, ServiceError> {
    Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ServiceError::InternalError(format!("no start of year for {}", now)))
}

/// A whole-second timestamp drawn uniformly from `[start, end]`.
fn uniform_between<R: Rng + ?Sized>(
    rng: &mut R,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> DateTime<Utc> {
    let (lo, hi) = (start.timestamp(), end.timestamp());
    if hi <= lo {
        return start;
    }
    DateTime::<Utc>::from_timestamp(rng.gen_range(lo..=hi), 0)
        .map_or(start, |drawn| drawn.max(start))
}

/// Placement, shipment and delivery dates in fulfillment order.
pub fn random_order_dates<R: Rng + ?Sized>(
    rng: &mut R,
    year_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<OrderDates, ServiceError> {
    let order_date = uniform_between(rng, year_start, now);

    let ship_date = if rng.gen_bool(SHIP_PROBABILITY) {
        Some(uniform_between(rng, order_date, now))
    } else {
        None
    };

    let delivered_date = match ship_date {
        Some(shipped) if rng.gen_bool(DELIVER_PROBABILITY) => {
            Some(uniform_between(rng, shipped, now))
        }
        _ => None,
    };

    OrderDates::new(order_date, ship_date, delivered_date)
}

fn coupon_distribution() -> Result<WeightedIndex<u32>, ServiceError> {
    WeightedIndex::new(COUPON_WEIGHTS)
        .map_err(|e| ServiceError::InternalError(format!("invalid coupon weights: {}", e)))
}

fn pick_coupon<R: Rng + ?Sized>(rng: &mut R, weights: &WeightedIndex<u32>) -> Option<CouponCode> {
    match weights.sample(rng) {
        0 => None,
        i => CouponCode::ALL.get(i - 1).copied(),
    }
}

fn rng_price<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(MIN_PRICE..=MAX_PRICE)
}

/// Between one and three distinct products from `pool`.
pub fn pick_products<R: Rng + ?Sized>(rng: &mut R, pool: &[i32]) -> Result<Vec<i32>, ServiceError> {
    if pool.is_empty() {
        return Err(ServiceError::InvalidInput(
            "cannot attach products to orders: no products exist".to_string(),
        ));
    }
    let k = rng.gen_range(1..=MAX_PRODUCTS_PER_ORDER.min(pool.len()));
    Ok(pool.choose_multiple(rng, k).copied().collect())
}

/// `count` customers with distinct, valid emails.
pub fn fabricate_customers<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
) -> Result<Vec<NewCustomer>, ServiceError> {
    let mut seen_emails = HashSet::with_capacity(count);
    let mut customers = Vec::with_capacity(count);

    for index in 0..count {
        let email = unique_email(rng, &mut seen_emails, index);
        let street: String = StreetName().fake_with_rng(rng);
        let building: String = BuildingNumber().fake_with_rng(rng);

        let customer = NewCustomer {
            first_name: FirstName().fake_with_rng(rng),
            last_name: LastName().fake_with_rng(rng),
            address: format!("{} {}", building, street),
            city: CityName().fake_with_rng(rng),
            postcode: ZipCode().fake_with_rng(rng),
            email,
        };
        customer.validate()?;
        customers.push(customer);
    }

    Ok(customers)
}

fn unique_email<R: Rng + ?Sized>(rng: &mut R, seen: &mut HashSet<String>, index: usize) -> String {
    for _ in 0..MAX_EMAIL_ATTEMPTS {
        let candidate: String = SafeEmail().fake_with_rng(rng);
        if candidate.len() <= 50 && seen.insert(candidate.clone()) {
            return candidate;
        }
    }

    let mut suffix = 0usize;
    loop {
        let candidate = if suffix == 0 {
            format!("customer{}@example.com", index)
        } else {
            format!("customer{}.{}@example.com", index, suffix)
        };
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap()
    }

    #[test]
    fn color_names_are_distinct_and_fit_the_column() {
        let unique: HashSet<&str> = COLOR_NAMES.iter().copied().collect();
        assert_eq!(unique.len(), COLOR_NAMES.len());
        assert!(COLOR_NAMES.iter().all(|name| !name.is_empty() && name.len() <= 50));
    }

    #[test]
    fn order_dates_stay_in_window_and_order() {
        let mut rng = StdRng::seed_from_u64(11);
        let year_start = start_of_year(now()).unwrap();

        for _ in 0..2000 {
            let dates = random_order_dates(&mut rng, year_start, now()).unwrap();
            assert!(dates.order_date() >= year_start && dates.order_date() <= now());
            if let Some(shipped) = dates.ship_date() {
                assert!(shipped >= dates.order_date() && shipped <= now());
            }
            if let Some(delivered) = dates.delivered_date() {
                let shipped = dates.ship_date().expect("delivered orders have shipped");
                assert!(delivered >= shipped && delivered <= now());
            }
        }
    }

    #[test]
    fn shipping_and_coupon_rates_are_roughly_as_weighted() {
        let mut rng = StdRng::seed_from_u64(3);
        let year_start = start_of_year(now()).unwrap();
        let coupons = coupon_distribution().unwrap();
        let draws = 10_000;

        let mut shipped = 0;
        let mut with_coupon = 0;
        for _ in 0..draws {
            if random_order_dates(&mut rng, year_start, now())
                .unwrap()
                .ship_date()
                .is_some()
            {
                shipped += 1;
            }
            if pick_coupon(&mut rng, &coupons).is_some() {
                with_coupon += 1;
            }
        }

        let ship_rate = shipped as f64 / draws as f64;
        let coupon_rate = with_coupon as f64 / draws as f64;
        assert!((0.87..0.93).contains(&ship_rate), "ship rate {ship_rate}");
        assert!((0.12..0.18).contains(&coupon_rate), "coupon rate {coupon_rate}");
    }

    #[test]
    fn uniform_between_handles_empty_range() {
        let mut rng = StdRng::seed_from_u64(0);
        let at = now();
        assert_eq!(uniform_between(&mut rng, at, at), at);
        assert_eq!(uniform_between(&mut rng, at, at - Duration::days(1)), at);
    }

    #[rstest]
    #[case(vec![1], 1)]
    #[case(vec![1, 2], 2)]
    #[case(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10], 3)]
    fn picks_between_one_and_three_distinct_products(#[case] pool: Vec<i32>, #[case] max: usize) {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let picked = pick_products(&mut rng, &pool).unwrap();
            let distinct: HashSet<i32> = picked.iter().copied().collect();
            assert!((1..=max).contains(&picked.len()));
            assert_eq!(distinct.len(), picked.len());
            assert!(picked.iter().all(|id| pool.contains(id)));
        }
    }

    #[test]
    fn empty_product_pool_is_rejected() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            pick_products(&mut rng, &[]),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn fabricated_customers_have_unique_valid_emails() {
        let mut rng = StdRng::seed_from_u64(42);
        let customers = fabricate_customers(&mut rng, 500).unwrap();
        let emails: HashSet<&str> = customers.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails.len(), 500);
        assert!(customers.iter().all(|c| c.validate().is_ok()));
    }

    #[test]
    fn same_seed_fabricates_same_customers() {
        let a = fabricate_customers(&mut StdRng::seed_from_u64(9), 20).unwrap();
        let b = fabricate_customers(&mut StdRng::seed_from_u64(9), 20).unwrap();
        let emails = |cs: &[NewCustomer]| cs.iter().map(|c| c.email.clone()).collect::<Vec<_>>();
        assert_eq!(emails(&a), emails(&b));
    }

    #[test]
    fn email_fallback_avoids_collisions() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen: HashSet<String> = ["customer7@example.com".to_string()].into();
        let fallback = {
            // Exhaust the random attempts by pre-filling what they would draw
            let mut lookahead = rng.clone();
            for _ in 0..MAX_EMAIL_ATTEMPTS {
                let drawn: String = SafeEmail().fake_with_rng(&mut lookahead);
                seen.insert(drawn);
            }
            unique_email(&mut rng, &mut seen, 7)
        };
        assert_eq!(fallback, "customer7.1@example.com");
    }
}
