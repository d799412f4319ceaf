use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    CommitOutcome, CommitRequest, InventoryStore, StockRecord, StoreError, next_created_at,
};
use crate::{
    catalog::Catalog,
    models::{Item, ItemId, ORDER_STATUS_PENDING, Order},
};

/// In-process backing store with the same commit semantics as [`super::PgStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    // insertion order doubles as catalog order
    items: Vec<StockRecord>,
    index: HashMap<ItemId, usize>,
    orders: Vec<Order>,
    last_created_at: Option<DateTime<Utc>>,
}

impl MemoryState {
    fn record_mut(&mut self, id: &ItemId) -> Option<&mut StockRecord> {
        let index = *self.index.get(id)?;
        self.items.get_mut(index)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        for item in items {
            store.upsert_item(item);
        }
        store
    }

    /// Insert or replace an item. Replacing bumps its version.
    pub fn upsert_item(&self, item: Item) {
        let mut state = self.inner.lock();
        if let Some(record) = state.record_mut(&item.id) {
            record.item = item;
            record.version += 1;
            return;
        }
        let index = state.items.len();
        state.index.insert(item.id.clone(), index);
        state.items.push(StockRecord { item, version: 0 });
    }

    /// Admin stock override. Returns `false` for unknown items.
    pub fn set_stock(&self, id: &ItemId, stock: u32) -> bool {
        self.update(id, |item| item.stock = stock)
    }

    pub fn set_price(&self, id: &ItemId, price: i64) -> bool {
        self.update(id, |item| item.price = price)
    }

    fn update(&self, id: &ItemId, apply: impl FnOnce(&mut Item)) -> bool {
        let mut state = self.inner.lock();
        match state.record_mut(id) {
            Some(record) => {
                apply(&mut record.item);
                record.version += 1;
                true
            }
            None => false,
        }
    }

    pub fn item(&self, id: &ItemId) -> Option<Item> {
        let state = self.inner.lock();
        state
            .index
            .get(id)
            .and_then(|&index| state.items.get(index))
            .map(|record| record.item.clone())
    }

    pub fn stock(&self, id: &ItemId) -> Option<u32> {
        self.item(id).map(|item| item.stock)
    }

    /// Orders in commit order.
    pub fn orders(&self) -> Vec<Order> {
        self.inner.lock().orders.clone()
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.inner
            .lock()
            .orders
            .iter()
            .find(|order| order.id == id)
            .cloned()
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let state = self.inner.lock();
        Ok(state.items.iter().map(|record| record.item.clone()).collect())
    }

    async fn get_item(&self, id: &ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.item(id))
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn read_stock(&self, ids: &[ItemId]) -> Result<Vec<Option<StockRecord>>, StoreError> {
        let state = self.inner.lock();
        Ok(ids
            .iter()
            .map(|id| {
                state
                    .index
                    .get(id)
                    .and_then(|&index| state.items.get(index))
                    .cloned()
            })
            .collect())
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome, StoreError> {
        let mut state = self.inner.lock();

        // Check every precondition before touching anything.
        for decrement in &request.decrements {
            let current = state
                .index
                .get(&decrement.item_id)
                .and_then(|&index| state.items.get(index));
            let fits = current.is_some_and(|record| {
                record.version == decrement.expected_version
                    && record.item.stock >= decrement.quantity
            });
            if !fits {
                return Ok(CommitOutcome::Conflict {
                    item_id: decrement.item_id.clone(),
                });
            }
        }

        for decrement in &request.decrements {
            let record = state.record_mut(&decrement.item_id).ok_or_else(|| {
                StoreError::Corrupt(format!("item {} vanished mid-commit", decrement.item_id))
            })?;
            record.item.stock -= decrement.quantity;
            record.version += 1;
        }

        let created_at = next_created_at(state.last_created_at);
        state.last_created_at = Some(created_at);

        let order = Order {
            id: Uuid::new_v4(),
            created_at,
            customer: request.order.customer,
            lines: request.order.lines,
            total: request.order.total,
            status: ORDER_STATUS_PENDING.to_string(),
        };
        state.orders.push(order.clone());

        Ok(CommitOutcome::Committed(order))
    }
}
