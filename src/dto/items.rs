use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Item;

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemList {
    pub items: Vec<Item>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetStockRequest {
    pub stock: u32,
}
