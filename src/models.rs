use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Status every order starts in. Only fulfillment changes it afterwards.
pub const ORDER_STATUS_PENDING: &str = "pending";

/// Stable, opaque catalog identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub mrp: i64,
    pub price: i64,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub payment_mode: String,
}

/// Line snapshot taken at checkout time; later catalog edits never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: i64,
}

impl OrderLine {
    pub fn amount(&self) -> i64 {
        i64::from(self.quantity).saturating_mul(self.unit_price)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    pub total: i64,
    pub status: String,
}
