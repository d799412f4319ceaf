//! Client-held cart: lines, persistence and legacy migration.

pub mod line;
pub mod migration;
pub mod persist;
pub mod store;

pub use line::{CartLine, CartLineError};
pub use migration::{Migration, MigrationReport, MigrationUnresolved, PersistedCart, migrate};
pub use persist::{
    CartError, CartPersistence, JsonFileCartPersistence, MemoryCartPersistence, RawCart,
    StoredLine,
};
pub use store::CartStore;
