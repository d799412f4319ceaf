use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Customer, ItemId, Order};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutLineRequest {
    pub item_id: ItemId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub customer: Customer,
    pub lines: Vec<CheckoutLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
