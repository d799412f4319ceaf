//! Backing stores for items and orders.
//!
//! An [`InventoryStore`] hands out stock together with a version token and
//! applies a [`CommitRequest`] only if none of those versions moved. Stock
//! decrements and the new order land together or not at all.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Customer, Item, ItemId, Order, OrderLine};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ORM error: {0}")]
    Orm(#[from] sea_orm::DbErr),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// An item as read from the backing store, with its consistency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecord {
    pub item: Item,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub item_id: ItemId,
    pub expected_version: i64,
    pub quantity: u32,
}

/// Order contents before the store assigns id, timestamp and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    /// Sorted by item id.
    pub decrements: Vec<StockDecrement>,
    pub order: NewOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Order),
    /// `item_id`'s version or stock changed since it was read; nothing was written.
    Conflict { item_id: ItemId },
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Current stock for each id, aligned with `ids`; `None` for unknown items.
    async fn read_stock(&self, ids: &[ItemId]) -> Result<Vec<Option<StockRecord>>, StoreError>;

    /// Apply every decrement and append the order atomically.
    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome, StoreError>;
}

/// Timestamp for a new order that never sorts before `last`.
pub(crate) fn next_created_at(
    last: Option<chrono::DateTime<chrono::Utc>>,
) -> chrono::DateTime<chrono::Utc> {
    let now = chrono::Utc::now();
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}
