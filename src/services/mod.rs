pub mod item_service;
pub mod order_service;
