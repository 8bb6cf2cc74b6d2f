use chrono::{DateTime, Duration, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize, Serializer};

use crate::entities::{customer, order};

/// A customer together with every order they placed, oldest id first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHistory {
    pub customer: customer::Model,
    pub orders: Vec<order::Model>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueReport {
    pub days: i64,
    /// Orders placed strictly after this instant are counted
    pub since: DateTime<Utc>,
    pub revenue: i64,
}

/// Mean time from placement to shipment over all shipped orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FulfillmentTime {
    pub shipped_orders: u64,
    #[serde(rename = "average_seconds", serialize_with = "serialize_seconds")]
    pub average: Option<Duration>,
}

impl FulfillmentTime {
    pub fn formatted(&self) -> Option<String> {
        self.average.map(format_duration)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize, Deserialize)]
pub struct CustomerSpend {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub total_spent: i64,
}

/// Renders a duration as `<days>d HH:MM:SS`, keeping whole days rather than
/// wrapping at 24 hours.
pub fn format_duration(duration: Duration) -> String {
    let sign = if duration < Duration::zero() { "-" } else { "" };
    let total = duration.num_seconds().unsigned_abs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{sign}{days}d {hours:02}:{minutes:02}:{seconds:02}")
}

fn serialize_seconds<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(duration) => serializer.serialize_some(&(duration.num_milliseconds() as f64 / 1000.0)),
        None => serializer.serialize_none(),
    }
}
