use thiserror::Error;

use crate::{models::ItemId, store::StoreError};

/// Why a checkout produced no order. Nothing was written in any of these cases.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    #[error("insufficient stock for item {item_id}: {available} available")]
    InsufficientStock { item_id: ItemId, available: u32 },

    /// Safe to retry the whole checkout unchanged.
    #[error("checkout kept conflicting with concurrent updates ({attempts} attempts)")]
    TransientConflict { attempts: u32 },

    #[error("inventory store failure: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::TransientConflict { .. })
    }
}
