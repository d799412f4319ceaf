pub mod items;
pub mod orders;
