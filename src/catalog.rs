//! Read-side view of the catalog.
//!
//! [`Catalog`] is the loader the rest of the crate pulls items from;
//! [`CatalogSnapshot`] keeps the last loaded list in memory so cart operations
//! and migration can resolve item ids without touching the backing store.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::{
    models::{Item, ItemId},
    store::StoreError,
};

#[async_trait]
pub trait Catalog: Send + Sync {
    /// All items in the catalog's display order.
    async fn list_items(&self) -> Result<Vec<Item>, StoreError>;

    async fn get_item(&self, id: &ItemId) -> Result<Option<Item>, StoreError>;
}

/// Immutable catalog contents as of one load.
#[derive(Debug, Default)]
pub struct CatalogView {
    items: Vec<Item>,
    by_id: HashMap<ItemId, usize>,
    loaded_at: Option<DateTime<Utc>>,
}

impl CatalogView {
    pub fn new(items: Vec<Item>) -> Self {
        let by_id = items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.id.clone(), index))
            .collect();
        Self {
            items,
            by_id,
            loaded_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.by_id.get(id).and_then(|&index| self.items.get(index))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_id.contains_key(&ItemId::from(key))
    }

    /// Item at `index` in the current ordering.
    pub fn at(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

/// Shared, swappable [`CatalogView`]. Readers keep the `Arc` they got even if a
/// refresh lands meanwhile.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    current: RwLock<Arc<CatalogView>>,
}

impl CatalogSnapshot {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            current: RwLock::new(Arc::new(CatalogView::new(items))),
        }
    }

    pub fn view(&self) -> Arc<CatalogView> {
        Arc::clone(&*self.current.read())
    }

    pub fn get(&self, id: &ItemId) -> Option<Item> {
        self.current.read().get(id).cloned()
    }

    pub fn replace(&self, items: Vec<Item>) {
        *self.current.write() = Arc::new(CatalogView::new(items));
    }

    /// Reload from `catalog`, returning the number of items now visible.
    pub async fn refresh(&self, catalog: &dyn Catalog) -> Result<usize, StoreError> {
        let items = catalog.list_items().await?;
        let count = items.len();
        self.replace(items);
        tracing::debug!(items = count, "catalog snapshot refreshed");
        Ok(count)
    }
}

/// Refresh `snapshot` from `catalog` every `every` until the task is aborted.
pub fn spawn_refresh(
    snapshot: Arc<CatalogSnapshot>,
    catalog: Arc<dyn Catalog>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(err) = snapshot.refresh(catalog.as_ref()).await {
                tracing::warn!(error = %err, "catalog refresh failed");
            }
        }
    })
}
