pub mod items;
pub mod order_lines;
pub mod orders;

pub use items::Entity as Items;
pub use order_lines::Entity as OrderLines;
pub use orders::Entity as Orders;
