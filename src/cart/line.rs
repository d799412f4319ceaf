use serde::Serialize;
use thiserror::Error;

use crate::{
    checkout::CheckoutLine,
    models::{Item, ItemId},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartLineError {
    #[error("cart line for {0} must have a positive quantity")]
    ZeroQuantity(ItemId),

    #[error("cart line for {item_id} has a negative price {price}")]
    NegativePrice { item_id: ItemId, price: i64 },
}

/// One cart entry. Quantity is always positive and both price snapshots are
/// non-negative; the constructors refuse anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    item_id: ItemId,
    quantity: u32,
    name: String,
    unit_price: i64,
    unit_mrp: i64,
}

impl CartLine {
    pub fn new(
        item_id: ItemId,
        quantity: u32,
        name: impl Into<String>,
        unit_price: i64,
        unit_mrp: i64,
    ) -> Result<Self, CartLineError> {
        if quantity == 0 {
            return Err(CartLineError::ZeroQuantity(item_id));
        }
        for price in [unit_price, unit_mrp] {
            if price < 0 {
                return Err(CartLineError::NegativePrice { item_id, price });
            }
        }
        Ok(Self {
            item_id,
            quantity,
            name: name.into(),
            unit_price,
            unit_mrp,
        })
    }

    /// Line for `item` with its current name and prices.
    pub fn for_item(item: &Item, quantity: u32) -> Result<Self, CartLineError> {
        Self::new(item.id.clone(), quantity, item.name.clone(), item.price, item.mrp)
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> i64 {
        self.unit_price
    }

    pub fn unit_mrp(&self) -> i64 {
        self.unit_mrp
    }

    /// Saturates: stored prices are client data.
    pub fn amount(&self) -> i64 {
        i64::from(self.quantity).saturating_mul(self.unit_price)
    }
}

impl From<&CartLine> for CheckoutLine {
    fn from(line: &CartLine) -> Self {
        CheckoutLine::new(line.item_id.clone(), line.quantity)
    }
}
