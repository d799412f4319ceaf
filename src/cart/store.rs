use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    line::{CartLine, CartLineError},
    migration::{CurrentCart, MigrationReport, migrate},
    persist::{CartError, CartPersistence, StoredLine},
};
use crate::{
    catalog::{CatalogSnapshot, CatalogView},
    models::ItemId,
};

/// The shopper's cart, kept in sync with its [`CartPersistence`].
///
/// Every mutation holds the cart lock across read, modify and save, so two
/// concurrent `set_quantity` calls never lose each other's update.
#[derive(Debug)]
pub struct CartStore<P> {
    persistence: P,
    catalog: Arc<CatalogSnapshot>,
    cart: Mutex<CurrentCart>,
}

impl<P: CartPersistence> CartStore<P> {
    /// Load, migrate and immediately re-save the persisted cart.
    pub fn open(
        persistence: P,
        catalog: Arc<CatalogSnapshot>,
    ) -> Result<(Self, MigrationReport), CartError> {
        let raw = persistence.load()?.unwrap_or_default();
        let migration = migrate(&raw, &catalog.view());
        persistence.save(&migration.cart.to_raw())?;

        tracing::debug!(
            source = ?migration.report.source,
            lines = migration.cart.lines.len(),
            unresolved = migration.cart.unresolved.len(),
            "cart loaded"
        );

        let store = Self {
            persistence,
            catalog,
            cart: Mutex::new(migration.cart),
        };
        Ok((store, migration.report))
    }

    /// Adjust `item_id` by `delta`, clamped to `[0, stock]`.
    ///
    /// Returns the resulting quantity (0 means the line is gone), or `None`
    /// without touching anything when the catalog does not know the item
    /// (see [`Self::remove_line`] for those).
    pub fn set_quantity(&self, item_id: &ItemId, delta: i64) -> Result<Option<u32>, CartError> {
        let view = self.catalog.view();
        let Some(item) = view.get(item_id) else {
            return Ok(None);
        };

        let mut cart = self.cart.lock();
        let current = cart.lines.get(item_id).map_or(0, CartLine::quantity);
        let next = clamp_quantity(current, delta, item.stock);

        let mut updated = cart.clone();
        match CartLine::for_item(item, next) {
            Ok(line) => {
                updated.lines.insert(item_id.clone(), line);
            }
            Err(CartLineError::ZeroQuantity(_)) => {
                updated.lines.remove(item_id);
            }
            Err(err) => return Err(err.into()),
        }
        self.persistence.save(&updated.to_raw())?;
        *cart = updated;

        Ok(Some(next))
    }

    /// Drop the line for `item_id` whether or not the catalog still knows it.
    /// Returns whether a line was removed.
    pub fn remove_line(&self, item_id: &ItemId) -> Result<bool, CartError> {
        let mut cart = self.cart.lock();
        if !cart.lines.contains_key(item_id) {
            return Ok(false);
        }
        let mut updated = cart.clone();
        updated.lines.remove(item_id);
        self.persistence.save(&updated.to_raw())?;
        *cart = updated;
        Ok(true)
    }

    pub fn quantity(&self, item_id: &ItemId) -> u32 {
        self.cart.lock().lines.get(item_id).map_or(0, CartLine::quantity)
    }

    pub fn total_quantity(&self) -> u64 {
        self.cart
            .lock()
            .lines
            .values()
            .map(|line| u64::from(line.quantity()))
            .sum()
    }

    pub fn total_amount(&self) -> i64 {
        self.cart
            .lock()
            .lines
            .values()
            .map(CartLine::amount)
            .fold(0, i64::saturating_add)
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.cart.lock().lines.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cart.lock().lines.is_empty()
    }

    /// Legacy entries migration could not place; never part of [`Self::lines`].
    pub fn unresolved(&self) -> Vec<(String, StoredLine)> {
        self.cart
            .lock()
            .unresolved
            .iter()
            .map(|(key, stored)| (key.clone(), stored.clone()))
            .collect()
    }

    /// Forget one unresolved legacy entry. Returns whether it existed.
    pub fn discard_unresolved(&self, legacy_key: &str) -> Result<bool, CartError> {
        let mut cart = self.cart.lock();
        if !cart.unresolved.contains_key(legacy_key) {
            return Ok(false);
        }
        let mut updated = cart.clone();
        updated.unresolved.remove(legacy_key);
        self.persistence.save(&updated.to_raw())?;
        *cart = updated;
        Ok(true)
    }

    /// Empty the cart. Unresolved legacy entries stay for manual recovery.
    pub fn clear(&self) -> Result<(), CartError> {
        let mut cart = self.cart.lock();
        let updated = CurrentCart {
            lines: Default::default(),
            unresolved: cart.unresolved.clone(),
        };
        self.persistence.save(&updated.to_raw())?;
        *cart = updated;
        Ok(())
    }

    pub fn catalog(&self) -> Arc<CatalogView> {
        self.catalog.view()
    }
}

fn clamp_quantity(current: u32, delta: i64, stock: u32) -> u32 {
    let next = i64::from(current).saturating_add(delta);
    next.clamp(0, i64::from(stock)) as u32
}
