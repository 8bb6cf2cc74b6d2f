use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use tracing::{debug, info, instrument};

use crate::{
    config::ReportConfig,
    entities::{customer, order, order_product, product, CouponCode},
    errors::ServiceError,
    reports::{CustomerSpend, FulfillmentTime, OrderHistory, RevenueReport},
};

/// Read-only reporting queries over customers, orders and products
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    defaults: ReportConfig,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>, defaults: ReportConfig) -> Self {
        Self { db, defaults }
    }

    /// Order history of one customer
    #[instrument(skip(self))]
    pub async fn order_history(&self, customer_id: i32) -> Result<OrderHistory, ServiceError> {
        let db = &*self.db;

        let customer = customer::Entity::find_by_id(customer_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", customer_id))?;

        let orders = customer
            .find_related(order::Entity)
            .order_by_asc(order::Column::Id)
            .all(db)
            .await?;

        debug!(orders = orders.len(), "Loaded order history for {}", customer.full_name());
        Ok(OrderHistory { customer, orders })
    }

    /// Orders that have not shipped, most recently placed first
    #[instrument(skip(self))]
    pub async fn pending_orders(&self) -> Result<Vec<order::Model>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::ShipDate.is_null())
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::Id)
            .all(&*self.db)
            .await?;

        debug!(count = orders.len(), "Loaded pending orders");
        Ok(orders)
    }

    #[instrument(skip(self))]
    pub async fn customer_count(&self) -> Result<u64, ServiceError> {
        Ok(customer::Entity::find().count(&*self.db).await?)
    }

    /// Orders carrying any coupon other than free shipping
    #[instrument(skip(self))]
    pub async fn orders_with_coupon(&self) -> Result<Vec<order::Model>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::CouponCode.is_not_null())
            .filter(order::Column::CouponCode.ne(CouponCode::FreeShipping))
            .order_by_asc(order::Column::Id)
            .all(&*self.db)
            .await?;

        debug!(count = orders.len(), "Loaded orders with coupon");
        Ok(orders)
    }

    /// Revenue of orders placed in the trailing `days` window, defaulting to
    /// the configured window
    #[instrument(skip(self))]
    pub async fn revenue_in_last_days(&self, days: Option<i64>) -> Result<RevenueReport, ServiceError> {
        let days = days.unwrap_or(self.defaults.revenue_window_days);
        if days < 0 {
            return Err(ServiceError::InvalidInput(format!(
                "revenue window must not be negative, got {} days",
                days
            )));
        }

        let window = Duration::try_days(days).ok_or_else(|| {
            ServiceError::InvalidInput(format!("revenue window of {} days is too large", days))
        })?;
        let since = Utc::now()
            .checked_sub_signed(window)
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("revenue window of {} days is too large", days))
            })?;

        let revenue = self.revenue_since(since).await?;
        info!(days, revenue, "Computed revenue");

        Ok(RevenueReport {
            days,
            since,
            revenue,
        })
    }

    /// Sum of product prices over every order/product pair whose order was
    /// placed strictly after `since`
    #[instrument(skip(self))]
    pub async fn revenue_since(&self, since: DateTime<Utc>) -> Result<i64, ServiceError> {
        let revenue: Option<Option<i64>> = product::Entity::find()
            .select_only()
            .column_as(sum_of_prices(), "revenue")
            .join(JoinType::InnerJoin, product::Relation::OrderProducts.def())
            .join(JoinType::InnerJoin, order_product::Relation::Order.def())
            .filter(order::Column::OrderDate.gt(since))
            .into_tuple::<Option<i64>>()
            .one(&*self.db)
            .await?;

        Ok(revenue.flatten().unwrap_or(0))
    }

    /// Mean time between placement and shipment
    #[instrument(skip(self))]
    pub async fn average_fulfillment_time(&self) -> Result<FulfillmentTime, ServiceError> {
        let shipped: Vec<(DateTime<Utc>, DateTime<Utc>)> = order::Entity::find()
            .select_only()
            .column(order::Column::OrderDate)
            .column(order::Column::ShipDate)
            .filter(order::Column::ShipDate.is_not_null())
            .into_tuple()
            .all(&*self.db)
            .await?;

        let report = FulfillmentTime {
            shipped_orders: shipped.len() as u64,
            average: average_duration(shipped.iter().map(|(placed, sent)| *sent - *placed)),
        };

        debug!(shipped = report.shipped_orders, average = ?report.average, "Computed fulfillment time");
        Ok(report)
    }

    /// Customers whose purchases add up to more than `amount`, defaulting
    /// to the configured threshold
    #[instrument(skip(self))]
    pub async fn customers_spending_over(
        &self,
        amount: Option<i64>,
    ) -> Result<Vec<CustomerSpend>, ServiceError> {
        let threshold = amount.unwrap_or(self.defaults.spend_threshold);

        let customers = customer::Entity::find()
            .select_only()
            .column(customer::Column::Id)
            .column(customer::Column::FirstName)
            .column(customer::Column::LastName)
            .column(customer::Column::Email)
            .column_as(sum_of_prices(), "total_spent")
            .join(JoinType::InnerJoin, customer::Relation::Orders.def())
            .join(JoinType::InnerJoin, order::Relation::OrderProducts.def())
            .join(JoinType::InnerJoin, order_product::Relation::Product.def())
            .group_by(customer::Column::Id)
            .group_by(customer::Column::FirstName)
            .group_by(customer::Column::LastName)
            .group_by(customer::Column::Email)
            .having(Expr::expr(sum_of_prices()).gt(threshold))
            .order_by_asc(customer::Column::Id)
            .into_model::<CustomerSpend>()
            .all(&*self.db)
            .await?;

        info!(threshold, count = customers.len(), "Found big spenders");
        Ok(customers)
    }
}

fn sum_of_prices() -> SimpleExpr {
    Func::sum(Expr::col((product::Entity, product::Column::Price))).into()
}

fn average_duration(durations: impl Iterator<Item = Duration>) -> Option<Duration> {
    let (count, total_ms) = durations.fold((0i64, 0i128), |(n, sum), d| {
        (n + 1, sum + i128::from(d.num_milliseconds()))
    });
    if count == 0 {
        return None;
    }
    i64::try_from(total_ms / i128::from(count))
        .ok()
        .and_then(Duration::try_milliseconds)
}
