use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ServiceError;

/// Order entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Placement time; filled with the insertion time when left unset
    pub order_date: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub ship_date: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub delivered_date: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub coupon_code: Option<CouponCode>,
    pub customer_id: i32,
}

impl Model {
    pub fn dates(&self) -> Result<OrderDates, ServiceError> {
        OrderDates::new(self.order_date, self.ship_date, self.delivered_date)
    }

    pub fn is_pending(&self) -> bool {
        self.ship_date.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Customer,
    #[sea_orm(has_many = "super::order_product::Entity")]
    OrderProducts,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::order_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderProducts.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        super::order_product::Relation::Product.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::order_product::Relation::Order.def().rev())
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if let ActiveValue::NotSet = active_model.order_date {
                active_model.order_date = Set(Utc::now());
            }
        }

        // Unset nullable columns are stored as NULL on insert
        let mut order_date = set_value(&active_model.order_date);
        let mut ship_date = nullable_value(&active_model.ship_date, insert);
        let mut delivered_date = nullable_value(&active_model.delivered_date, insert);

        // A partial update keeps the stored value of every untouched column
        if order_date.is_none() || ship_date.is_none() || delivered_date.is_none() {
            if let Some(id) = set_value(&active_model.id) {
                if let Some(stored) = Entity::find_by_id(id).one(db).await? {
                    order_date = order_date.or(Some(stored.order_date));
                    ship_date = ship_date.or(Some(stored.ship_date));
                    delivered_date = delivered_date.or(Some(stored.delivered_date));
                }
            }
        }

        if let (Some(order_date), Some(ship_date), Some(delivered_date)) =
            (order_date, ship_date, delivered_date)
        {
            OrderDates::new(order_date, ship_date, delivered_date)
                .map_err(|e| DbErr::Custom(e.to_string()))?;
        }

        Ok(active_model)
    }
}

fn set_value<V>(value: &ActiveValue<V>) -> Option<V>
where
    V: Into<sea_orm::Value> + Clone,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v.clone()),
        ActiveValue::NotSet => None,
    }
}

fn nullable_value<V>(value: &ActiveValue<Option<V>>, insert: bool) -> Option<Option<V>>
where
    Option<V>: Into<sea_orm::Value>,
    V: Clone,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v.clone()),
        ActiveValue::NotSet if insert => Some(None),
        ActiveValue::NotSet => None,
    }
}

/// Promotional codes an order may carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
pub enum CouponCode {
    #[sea_orm(string_value = "50OFF")]
    #[serde(rename = "50OFF")]
    FiftyOff,
    #[sea_orm(string_value = "FREESHIPPING")]
    #[serde(rename = "FREESHIPPING")]
    FreeShipping,
    #[sea_orm(string_value = "BUYONEGETONE")]
    #[serde(rename = "BUYONEGETONE")]
    BuyOneGetOne,
}

impl CouponCode {
    pub const ALL: [CouponCode; 3] = [
        CouponCode::FiftyOff,
        CouponCode::FreeShipping,
        CouponCode::BuyOneGetOne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CouponCode::FiftyOff => "50OFF",
            CouponCode::FreeShipping => "FREESHIPPING",
            CouponCode::BuyOneGetOne => "BUYONEGETONE",
        }
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The placement, shipping and delivery timestamps of an order.
///
/// Construction fails unless the timestamps are in fulfillment order: a
/// delivered order has shipped, shipping happens no earlier than placement,
/// and delivery no earlier than shipping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderDates {
    order_date: DateTime<Utc>,
    ship_date: Option<DateTime<Utc>>,
    delivered_date: Option<DateTime<Utc>>,
}

impl OrderDates {
    pub fn new(
        order_date: DateTime<Utc>,
        ship_date: Option<DateTime<Utc>>,
        delivered_date: Option<DateTime<Utc>>,
    ) -> Result<Self, ServiceError> {
        match (ship_date, delivered_date) {
            (None, Some(_)) => Err(ServiceError::ValidationError(
                "order cannot be delivered before it has shipped".to_string(),
            )),
            (Some(shipped), _) if shipped < order_date => {
                Err(ServiceError::ValidationError(format!(
                    "ship date {} precedes order date {}",
                    shipped, order_date
                )))
            }
            (Some(shipped), Some(delivered)) if delivered < shipped => {
                Err(ServiceError::ValidationError(format!(
                    "delivered date {} precedes ship date {}",
                    delivered, shipped
                )))
            }
            _ => Ok(Self {
                order_date,
                ship_date,
                delivered_date,
            }),
        }
    }

    /// An order that has been placed but not shipped.
    pub fn placed(order_date: DateTime<Utc>) -> Self {
        Self {
            order_date,
            ship_date: None,
            delivered_date: None,
        }
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn ship_date(&self) -> Option<DateTime<Utc>> {
        self.ship_date
    }

    pub fn delivered_date(&self) -> Option<DateTime<Utc>> {
        self.delivered_date
    }

    /// Time between placement and shipment, if shipped.
    pub fn fulfillment_time(&self) -> Option<chrono::Duration> {
        self.ship_date.map(|shipped| shipped - self.order_date)
    }

    pub fn into_active_model(self, customer_id: i32, coupon_code: Option<CouponCode>) -> ActiveModel {
        ActiveModel {
            order_date: Set(self.order_date),
            ship_date: Set(self.ship_date),
            delivered_date: Set(self.delivered_date),
            coupon_code: Set(coupon_code),
            customer_id: Set(customer_id),
            ..Default::default()
        }
    }
}
